mod common;

use common::*;
use mp4probe::{Error, Selection, Selector, select};

fn three_tracks() -> Vec<u8> {
    let trak = |id: u8| boxed(b"trak", &boxed(b"tkhd", &[id; 4]));
    concat(&[ftyp(), boxed(b"moov", &concat(&[mvhd(1), trak(1), trak(2), trak(3)]))])
}

#[test]
fn indexed_path_matches_direct_slice() {
    let data = three_tracks();
    // second trak's tkhd content: ftyp 24 + moov header 8 + mvhd 108 + trak 20 + trak header 8 + tkhd header 8
    let offset = 24 + 8 + 108 + 20 + 8 + 8;
    let expected = data[offset..offset + 4].to_vec();

    let w = window(data);
    let sel = Selector::parse("moov[0]/trak[1]/tkhd[0]").unwrap();
    assert_eq!(sel.dump(&w).unwrap(), expected);
    assert_eq!(expected, vec![2; 4]);
}

#[test]
fn unindexed_step_fans_out() {
    let w = window(three_tracks());
    let matches = select("moov/trak", &w).unwrap();
    assert_eq!(matches.len(), 3);

    // a further indexed step is applied to each continuation in order
    let leaves = select("moov/trak/tkhd[0]", &w).unwrap();
    let bytes: Vec<Vec<u8>> = leaves.iter().map(|l| l.materialize().unwrap()).collect();
    assert_eq!(bytes, vec![vec![1; 4], vec![2; 4], vec![3; 4]]);

    let sel = Selector::parse("moov/trak").unwrap();
    assert!(matches!(sel.select_one(&w).unwrap(), Selection::Ambiguous(3)));
}

fn vendor_boxes() -> (Vec<u8>, [u8; 16], [u8; 16]) {
    let a: [u8; 16] = *b"\x2b\x7b\x6a\xf6\x7a\x1f\x11\xe2\x83\xd0\x00\x17\xf2\x00\xbe\x7f";
    let mut b = a;
    b[3] = 0xf8;
    let payload = |id: &[u8; 16], tail: &[u8]| {
        let mut p = id.to_vec();
        p.extend_from_slice(tail);
        boxed(b"DATA", &p)
    };
    let data = boxed(b"TSCM", &concat(&[payload(&a, b"first"), payload(&b, b"second")]));
    (data, a, b)
}

#[test]
fn prefix_qualifier_disambiguates() {
    let (data, _a, b) = vendor_boxes();
    let w = window(data);

    let sel = format!("TSCM/DATA${}/+16", hex::encode(b));
    assert_eq!(Selector::parse(&sel).unwrap().dump(&w).unwrap(), b"second");

    // a shorter prefix still works, a wrong one matches nothing
    assert_eq!(select("TSCM/DATA$2b7b6af6/+16", &w).unwrap().len(), 1);
    assert!(select("TSCM/DATA$2b7b6af7", &w).unwrap().is_empty());
    assert!(!Selector::parse("TSCM/DATA$2b7b6af7").unwrap().exists(&w).unwrap());
}

#[test]
fn literal_qualifier_matches_utf8_prefix() {
    let data = concat(&[boxed(b"note", b"alpha"), boxed(b"note", b"beta")]);
    let w = window(data);
    assert_eq!(select("note:be", &w).unwrap()[0].materialize().unwrap(), b"beta");
}

#[test]
fn skip_past_window_end_is_out_of_range() {
    let w = window(boxed(b"uuid", &[0; 16]));
    assert_eq!(select("uuid/+16", &w).unwrap()[0].len(), 0);
    let err = select("uuid/+17", &w).unwrap_err();
    assert!(matches!(err, Error::OutOfRange { .. }));
}

#[test]
fn missing_occurrence_is_not_found() {
    let w = window(three_tracks());
    let err = select("moov/trak[3]", &w).unwrap_err();
    match err {
        Error::SelectorNotFound { index, found, .. } => assert_eq!((index, found), (3, 3)),
        other => panic!("unexpected {other:?}"),
    }

    let sel = Selector::parse("moov/trak[5]/tkhd").unwrap();
    assert!(!sel.exists(&w).unwrap());
    assert!(matches!(sel.select_one(&w).unwrap(), Selection::NotFound));
    assert!(Selector::parse("moov/mvhd").unwrap().exists(&w).unwrap());
}

#[test]
fn exists_stops_before_later_damage() {
    // the first match is intact, the box after it is truncated
    let mut broken = boxed(b"mdat", &[0; 32]);
    broken.truncate(12);
    let w = window(concat(&[boxed(b"free", &[]), broken]));

    assert!(Selector::parse("free").unwrap().exists(&w).unwrap());
    assert!(Selector::parse("free[0]").unwrap().exists(&w).unwrap());
    // walking past the damage to look for more matches surfaces it
    let err = select("mdat", &w).unwrap_err();
    assert!(matches!(err, Error::StructuralTruncation { .. }));
}

#[test]
fn select_one_finds_single_match() {
    let w = window(three_tracks());
    match Selector::parse("moov/mvhd").unwrap().select_one(&w).unwrap() {
        Selection::Found(m) => assert_eq!(m.len(), 100),
        other => panic!("unexpected {other:?}"),
    }
}

fn tracks_with_optional_tref() -> Vec<u8> {
    let plain = boxed(b"trak", &boxed(b"tkhd", &[1; 4]));
    let with_tref = boxed(
        b"trak",
        &concat(&[boxed(b"tkhd", &[2; 4]), boxed(b"tref", b"ref!")]),
    );
    boxed(b"moov", &concat(&[plain, with_tref]))
}

#[test]
fn fan_out_branches_are_independent() {
    let w = window(tracks_with_optional_tref());
    let sel = Selector::parse("moov/trak/tref[0]").unwrap();

    // the first trak has no tref, the second does
    assert!(sel.exists(&w).unwrap());
    assert_eq!(sel.dump(&w).unwrap(), b"ref!");
    assert!(matches!(sel.select_one(&w).unwrap(), Selection::Found(_)));

    // no branch matching at all still reports the missing occurrence
    let err = select("moov/trak/tref[1]", &w).unwrap_err();
    assert!(matches!(err, Error::SelectorNotFound { index: 1, .. }));
    assert!(!Selector::parse("moov/trak/tref[1]").unwrap().exists(&w).unwrap());
}

#[test]
fn write_to_streams_every_match() {
    let w = window(three_tracks());
    let mut out = Vec::new();
    let n = Selector::parse("moov/trak/tkhd")
        .unwrap()
        .write_to(&w, &mut out)
        .unwrap();
    assert_eq!(n, 12);
    assert_eq!(out, [[1u8; 4], [2; 4], [3; 4]].concat());
}
