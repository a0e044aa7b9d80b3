mod common;

use common::*;
use mp4probe::check::{clean_stale_results, result_file_path};
use mp4probe::config::DEFAULT_SIGNATURE;
use mp4probe::{BoxTree, CheckOptions, Status, check_file, classify};
use std::fs;
use std::path::Path;

fn good_file() -> Vec<u8> {
    concat(&[ftyp(), boxed(b"moov", &mvhd(1000)), boxed(b"mdat", &[0; 64])])
}

fn result_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains(" result "))
        .collect();
    names.sort();
    names
}

#[test]
fn classify_statuses() {
    let tree = BoxTree::parse(&window(good_file()));
    assert_eq!(classify(&tree, 1_000_000), Status::Good);

    let mut cut = good_file();
    cut.truncate(cut.len() - 10);
    let tree = BoxTree::parse(&window(cut));
    assert_eq!(classify(&tree, 1_000_000), Status::Incomplete);

    let bad_mvhd = full_box(b"mvhd", 7, 0, &[0; 96]);
    let tree = BoxTree::parse(&window(concat(&[ftyp(), boxed(b"moov", &bad_mvhd)])));
    assert_eq!(classify(&tree, 1_000_000), Status::Malformed);
}

#[test]
fn truncation_inside_a_box_wins_over_decode_errors() {
    let bad_mvhd = full_box(b"mvhd", 7, 0, &[0; 96]);
    let mut trak = boxed(b"trak", &[0; 40]);
    trak.truncate(16);
    let data = concat(&[ftyp(), boxed(b"moov", &concat(&[bad_mvhd, trak]))]);
    let tree = BoxTree::parse(&window(data));
    assert!(tree.error().is_none());
    assert_eq!(classify(&tree, 1_000_000), Status::Incomplete);
}

#[test]
fn index_behind_large_mdat() {
    let data = concat(&[ftyp(), boxed(b"mdat", &[0; 200]), boxed(b"moov", &mvhd(1))]);
    let tree = BoxTree::parse(&window(data));
    // moov starts at 232
    assert_eq!(classify(&tree, 100), Status::IndexNotNearFront);
    assert_eq!(classify(&tree, 232), Status::Good);
    assert_eq!(Status::IndexNotNearFront.code(), 3);
}

#[test]
fn result_file_name_appends_signature() {
    let p = result_file_path(Path::new("/media/clip.mov"), DEFAULT_SIGNATURE, Status::Incomplete);
    assert_eq!(
        p.to_string_lossy(),
        "/media/clip.mov -- MP4 check result INCOMPLETE"
    );
}

#[test]
fn check_writes_single_result_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    fs::write(&path, good_file()).unwrap();

    let outcome = check_file(&path, &CheckOptions::default()).unwrap();
    assert_eq!(outcome.status, Status::Good);
    assert!(outcome.warnings.is_empty());
    assert_eq!(result_files(dir.path()), ["clip.mp4 -- MP4 check result GOOD"]);

    let written = fs::read_to_string(outcome.result_file.unwrap()).unwrap();
    assert!(written.contains("ftyp"));
    assert!(written.contains("mvhd"));

    // truncate and check again: the old result is replaced
    let mut data = good_file();
    data.truncate(data.len() - 5);
    fs::write(&path, data).unwrap();
    let outcome = check_file(&path, &CheckOptions::default()).unwrap();
    assert_eq!(outcome.status, Status::Incomplete);
    assert_eq!(
        result_files(dir.path()),
        ["clip.mp4 -- MP4 check result INCOMPLETE"]
    );
    let written = fs::read_to_string(outcome.result_file.unwrap()).unwrap();
    assert!(written.contains("(5 missing)"), "{written}");
}

#[cfg(unix)]
#[test]
fn result_file_is_group_writable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.mp4");
    fs::write(&path, good_file()).unwrap();
    let outcome = check_file(&path, &CheckOptions::default()).unwrap();
    let mode = fs::metadata(outcome.result_file.unwrap())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o664);
}

#[test]
fn stale_cleanup_leaves_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.mp4");
    fs::write(&path, good_file()).unwrap();
    fs::write(dir.path().join("b.mp4 -- MP4 check result GOOD"), "").unwrap();
    fs::write(dir.path().join("b.mp4 -- MP4 check result INCOMPLETE"), "").unwrap();
    fs::write(dir.path().join("bb.mp4 -- MP4 check result GOOD"), "").unwrap();

    assert_eq!(clean_stale_results(&path, DEFAULT_SIGNATURE).unwrap(), 2);
    assert_eq!(result_files(dir.path()), ["bb.mp4 -- MP4 check result GOOD"]);
}

#[test]
fn result_file_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.mp4");
    fs::write(&path, good_file()).unwrap();

    let opts = CheckOptions {
        write_result: false,
        ..CheckOptions::default()
    };
    let outcome = check_file(&path, &opts).unwrap();
    assert!(outcome.result_file.is_none());
    assert!(result_files(dir.path()).is_empty());
    assert!(outcome.path.is_absolute());
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(check_file(dir.path().join("nope.mp4"), &CheckOptions::default()).is_err());
}

#[test]
fn late_index_is_reported_over_decode_problems() {
    let bad_mvhd = full_box(b"mvhd", 7, 0, &[0; 96]);
    let data = concat(&[ftyp(), boxed(b"mdat", &[0; 200]), boxed(b"moov", &bad_mvhd)]);
    let tree = BoxTree::parse(&window(data));
    assert!(tree.has_issues());
    assert_eq!(classify(&tree, 100), Status::IndexNotNearFront);
    assert_eq!(classify(&tree, 1_000_000), Status::Malformed);
}
