//! Text and JSON renderings of a [`BoxTree`].
//!
//! The text form is the one written to check result files:
//!
//! ```text
//! [1] ftyp  [@0 + 24] { isom 512 [isom, mp41] }
//! [2] moov  [@24 + 120] // 2 children...
//! {
//!     [1] mvhd  [@32 + 108] { ... }
//! }
//! ```

use crate::check::Status;
use crate::decoders::Record;
use crate::error::Error;
use crate::known_boxes::full_name;
use crate::tree::{BoxTree, Content, NodeId};
use serde::Serialize;
use std::fmt::Write;

const INDENT: &str = "    ";

fn line_indent(n: usize) -> String {
    INDENT.repeat(n)
}

/// Indent every non-empty line of `text` by `n` levels.
fn block_indent(n: usize, text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                line_indent(n) + line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn error_line(e: &Error) -> String {
    format!("{}: {}", e.name(), e)
}

/// Render the whole tree, followed by the top-level error if the walk
/// stopped early.
pub fn render_text(tree: &BoxTree) -> String {
    let mut out = String::new();
    for (i, &id) in tree.roots().iter().enumerate() {
        render_node(tree, id, 0, i, &mut out);
    }
    if let Some(e) = tree.error() {
        out.push_str(&error_line(e));
        out.push('\n');
    }
    out
}

fn render_node(tree: &BoxTree, id: NodeId, indent: usize, index: usize, out: &mut String) {
    let node = tree.node(id);
    let pad = line_indent(indent);

    let _ = write!(out, "{pad}[{}] {}", index + 1, node.typ);
    if let Some(name) = tree.item_name(id).filter(|n| *n != node.typ.as_str_lossy()) {
        let _ = write!(out, " <{name}>");
    }
    let _ = write!(out, "  [@{} + {}]", node.start, node.size);
    if node.is_container() {
        let _ = write!(out, " // {} children...", node.children.len());
    }

    match &node.content {
        Content::Container => {
            let _ = write!(out, "\n{pad}{{\n");
            for (i, &child) in node.children.iter().enumerate() {
                render_node(tree, child, indent + 1, i, out);
            }
            if let Some(e) = &node.error {
                let _ = writeln!(out, "{}", block_indent(indent + 1, &error_line(e)));
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Content::Record(record) => {
            let text = record.to_string();
            if text.contains('\n') {
                let _ = write!(out, "\n{pad}{{\n{}\n{pad}}}\n", block_indent(indent + 1, &text));
            } else {
                let _ = writeln!(out, " {{ {text} }}");
            }
        }
        Content::Unparsed(_) => {
            out.push('\n');
            if let Some(e) = &node.error {
                let _ = writeln!(out, "{}", block_indent(indent + 1, &error_line(e)));
            }
        }
    }
}

/// A JSON-serializable representation of a single box.
#[derive(Debug, Serialize)]
pub struct JsonBox {
    pub offset: u64,
    pub size: u64,
    pub header_size: u64,
    pub typ: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<JsonBox>>,
}

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub path: String,
    pub status: Status,
    pub status_text: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub boxes: Vec<JsonBox>,
}

impl JsonReport {
    pub fn new(path: impl Into<String>, tree: &BoxTree, status: Status) -> Self {
        Self {
            path: path.into(),
            status,
            status_text: status.text(),
            error: tree.error().map(error_line),
            boxes: json_tree(tree),
        }
    }
}

/// Build the JSON tree. Records are cloned so the result outlives the tree.
pub fn json_tree(tree: &BoxTree) -> Vec<JsonBox> {
    tree.roots().iter().map(|&id| json_box(tree, id)).collect()
}

fn json_box(tree: &BoxTree, id: NodeId) -> JsonBox {
    let node = tree.node(id);
    let (kind, decoded, children) = match &node.content {
        Content::Container => (
            "container",
            None,
            Some(node.children.iter().map(|&c| json_box(tree, c)).collect()),
        ),
        Content::Record(r) => ("record", Some(r.clone()), None),
        Content::Unparsed(_) => ("unparsed", None, None),
    };
    JsonBox {
        offset: node.start,
        size: node.size,
        header_size: node.header_size,
        typ: node.typ.to_string(),
        full_name: full_name(node.typ),
        item_name: tree.item_name(id),
        kind,
        decoded,
        error: node.error.as_ref().map(error_line),
        children,
    }
}
