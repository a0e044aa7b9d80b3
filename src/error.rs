use crate::boxes::FourCC;

/// Broad category of an [`Error`], used by callers that only need to know
/// which part of the pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Io,
    Structural,
    Decode,
    Selector,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("incomplete data @{offset}: needed {needed} bytes, {available} available")]
    IncompleteData {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("range {start}..{stop} outside window of length {len}")]
    OutOfRange { start: u64, stop: u64, len: u64 },

    #[error(
        "Atom {}@{start} Should end at {expected_end}, does end at {actual_end} ({} missing)",
        display_typ(.typ),
        missing(.expected_end, .actual_end)
    )]
    StructuralTruncation {
        typ: Option<FourCC>,
        start: u64,
        expected_end: u64,
        actual_end: u64,
    },

    #[error("invalid box size {size} for {typ}@{start}")]
    InvalidSize { typ: FourCC, start: u64, size: u64 },

    #[error("{typ}@{start}: {reason}")]
    DecodeAssumption {
        typ: FourCC,
        start: u64,
        reason: String,
    },

    #[error("box nesting deeper than {limit} levels @{start}")]
    DepthExceeded { start: u64, limit: usize },

    #[error("selector step {step:?}: wanted occurrence {index}, found {found}")]
    SelectorNotFound {
        step: String,
        index: usize,
        found: usize,
    },

    #[error("invalid selector {input:?}: {reason}")]
    InvalidSelector { input: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

fn missing(expected_end: &u64, actual_end: &u64) -> u64 {
    expected_end.saturating_sub(*actual_end)
}

fn display_typ(typ: &Option<FourCC>) -> String {
    match typ {
        Some(t) => t.to_string(),
        None => "<header>".to_string(),
    }
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Io(_) => ErrorClass::Io,
            Error::IncompleteData { .. }
            | Error::OutOfRange { .. }
            | Error::StructuralTruncation { .. }
            | Error::InvalidSize { .. } => ErrorClass::Structural,
            Error::DecodeAssumption { .. } | Error::DepthExceeded { .. } => ErrorClass::Decode,
            Error::SelectorNotFound { .. } | Error::InvalidSelector { .. } => {
                ErrorClass::Selector
            }
        }
    }

    /// Whether this error means the file ends before its boxes say it should.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Error::StructuralTruncation { .. } | Error::IncompleteData { .. }
        )
    }

    /// Number of bytes a truncated box is missing.
    pub fn missing_bytes(&self) -> Option<u64> {
        match self {
            Error::StructuralTruncation {
                expected_end,
                actual_end,
                ..
            } => Some(missing(expected_end, actual_end)),
            _ => None,
        }
    }

    /// Short name used in diagnostic artifacts.
    pub fn name(&self) -> &'static str {
        match self {
            Error::Io(_) => "Io",
            Error::IncompleteData { .. } => "IncompleteData",
            Error::OutOfRange { .. } => "OutOfRange",
            Error::StructuralTruncation { .. } => "StructuralTruncation",
            Error::InvalidSize { .. } => "InvalidSize",
            Error::DecodeAssumption { .. } => "DecodeAssumptionViolation",
            Error::DepthExceeded { .. } => "DepthExceeded",
            Error::SelectorNotFound { .. } => "SelectorNotFound",
            Error::InvalidSelector { .. } => "InvalidSelector",
        }
    }
}
