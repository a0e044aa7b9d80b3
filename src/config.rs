//! Tunables for tree construction and file checks.
//!
//! Defaults can be overridden by a JSON file; any field left out keeps its
//! default.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_INDEX_THRESHOLD: u64 = 1_000_000;
pub const DEFAULT_SIGNATURE: &str = " -- MP4 check";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Deepest container nesting that is still descended into.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    #[serde(flatten)]
    pub parse: ParseOptions,
    /// A top-level box starting past this offset before `moov` is found
    /// means the index is not near the front.
    pub index_threshold: u64,
    /// Inserted between the input file name and ` result <STATUS>`.
    pub signature: String,
    pub write_result: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            index_threshold: DEFAULT_INDEX_THRESHOLD,
            signature: DEFAULT_SIGNATURE.to_string(),
            write_result: true,
        }
    }
}

impl CheckOptions {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
