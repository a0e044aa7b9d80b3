//! File health classification and the sibling result file.

use crate::config::CheckOptions;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::report::render_text;
use crate::tree::BoxTree;
use crate::window::ByteWindow;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Good,
    /// A box declares more bytes than the file holds.
    Incomplete,
    /// Complete with the index near the front, but some box broke a decoder
    /// assumption or nested too deep.
    Malformed,
    /// No `moov` before the first top-level box past the index threshold.
    IndexNotNearFront,
}

impl Status {
    /// Process exit code.
    pub fn code(self) -> i32 {
        match self {
            Status::Good => 0,
            Status::Incomplete => 1,
            Status::Malformed => 2,
            Status::IndexNotNearFront => 3,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Status::Good => "GOOD",
            Status::Incomplete => "INCOMPLETE",
            Status::Malformed => "MALFORMED",
            Status::IndexNotNearFront => "INDEX NOT AT BEGINNING",
        }
    }
}

fn is_incomplete(at_root: bool, e: &Error) -> bool {
    match e {
        Error::StructuralTruncation { .. } => true,
        Error::IncompleteData { .. } | Error::Io(_) => at_root,
        _ => false,
    }
}

/// Classify a decoded tree. Truncation anywhere wins, then a late index,
/// then decode problems.
pub fn classify(tree: &BoxTree, index_threshold: u64) -> Status {
    if tree
        .issues()
        .any(|(node, e)| is_incomplete(node.is_none(), e))
    {
        Status::Incomplete
    } else if !index_near_front(tree, index_threshold) {
        Status::IndexNotNearFront
    } else if tree.has_issues() {
        Status::Malformed
    } else {
        Status::Good
    }
}

/// Walk the top-level boxes in order. Reaching a box that starts past
/// `threshold` before seeing `moov` means the index is not near the front.
pub fn index_near_front(tree: &BoxTree, threshold: u64) -> bool {
    for &id in tree.roots() {
        let node = tree.node(id);
        if node.start > threshold {
            return false;
        }
        if &node.typ.0 == b"moov" {
            return true;
        }
    }
    true
}

/// `<absolute path><signature> result <STATUS>`.
pub fn result_file_path(abs: &Path, signature: &str, status: Status) -> PathBuf {
    let mut name = OsString::from(abs.as_os_str());
    name.push(signature);
    name.push(" result ");
    name.push(status.text());
    PathBuf::from(name)
}

/// Delete result files left over from earlier checks of `abs`. Returns how
/// many were removed.
pub fn clean_stale_results(abs: &Path, signature: &str) -> std::io::Result<usize> {
    let Some(file_name) = abs.file_name() else {
        return Ok(0);
    };
    let prefix = format!("{}{}", file_name.to_string_lossy(), signature);
    let dir = abs.parent().unwrap_or(Path::new("."));

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            tracing::debug!(path = %entry.path().display(), "removing stale result");
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[derive(Debug)]
pub struct CheckOutcome {
    /// Absolute path of the checked file.
    pub path: PathBuf,
    pub tree: BoxTree,
    pub status: Status,
    /// Where the result was written, if it was.
    pub result_file: Option<PathBuf>,
    /// Non-fatal problems, such as a result file that could not be written.
    pub warnings: Vec<String>,
}

/// Decode, classify and, unless disabled, record the result next to the file.
pub fn check_file(path: impl AsRef<Path>, opts: &CheckOptions) -> Result<CheckOutcome> {
    let abs = std::path::absolute(path.as_ref())?;
    let window = ByteWindow::open(&abs)?;
    let tree = BoxTree::parse_with(&window, Registry::standard(), &opts.parse);
    let status = classify(&tree, opts.index_threshold);
    tracing::debug!(path = %abs.display(), status = status.text(), "checked");

    let mut outcome = CheckOutcome {
        path: abs,
        tree,
        status,
        result_file: None,
        warnings: Vec::new(),
    };
    if opts.write_result {
        write_result(&mut outcome, &opts.signature)?;
    }
    Ok(outcome)
}

/// Replace earlier result files with one for `outcome`. Permission errors
/// become warnings; other I/O errors are returned.
pub fn write_result(outcome: &mut CheckOutcome, signature: &str) -> Result<()> {
    match clean_stale_results(&outcome.path, signature) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::warn!(error = %e, "could not clean up check result files");
            outcome
                .warnings
                .push("could not clean up check result files".to_string());
        }
        Err(e) => return Err(e.into()),
    }

    let target = result_file_path(&outcome.path, signature, outcome.status);
    match fs::write(&target, render_text(&outcome.tree)) {
        Ok(()) => {
            set_result_permissions(&target)?;
            outcome.result_file = Some(target);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::warn!(error = %e, path = %target.display(), "could not write check result file");
            outcome
                .warnings
                .push("could not write check result file".to_string());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn set_result_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o664))
}

#[cfg(not(unix))]
fn set_result_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
