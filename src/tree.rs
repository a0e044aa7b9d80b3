//! The decoded box tree.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A failure
//! inside one container is recorded on that container and does not discard
//! the boxes already decoded around it.

use crate::boxes::{BoxHeader, FourCC};
use crate::config::ParseOptions;
use crate::decoders::{MetadataKeys, Record};
use crate::error::Error;
use crate::registry::{Handler, Registry};
use crate::walker::{BoxWalker, RawBox};
use crate::window::ByteWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug)]
pub enum Content {
    Container,
    Record(Record),
    /// Unknown type, or a decoder that gave up. The window covers the content.
    Unparsed(ByteWindow),
}

#[derive(Debug)]
pub struct BoxNode {
    pub typ: FourCC,
    pub start: u64,
    pub size: u64,
    pub header_size: u64,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub content: Content,
    pub error: Option<Error>,
}

impl BoxNode {
    pub fn header(&self) -> BoxHeader {
        BoxHeader {
            typ: self.typ,
            start: self.start,
            size: self.size,
            header_size: self.header_size,
        }
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub fn is_container(&self) -> bool {
        matches!(self.content, Content::Container)
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.content {
            Content::Record(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct BoxTree {
    nodes: Vec<BoxNode>,
    roots: Vec<NodeId>,
    error: Option<Error>,
}

impl BoxTree {
    /// Decode `window` with the standard registry and default options.
    pub fn parse(window: &ByteWindow) -> Self {
        Self::parse_with(window, Registry::standard(), &ParseOptions::default())
    }

    pub fn parse_with(window: &ByteWindow, registry: &Registry, opts: &ParseOptions) -> Self {
        let mut builder = Builder {
            registry,
            max_depth: opts.max_depth,
            nodes: Vec::new(),
        };
        let (roots, error) = builder.walk(window.clone(), None, 0);
        if let Some(e) = &error {
            tracing::warn!(error = %e, "top level walk stopped");
        }
        BoxTree {
            nodes: builder.nodes,
            roots,
            error,
        }
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Error that stopped the top-level walk, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &BoxNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&BoxNode> {
        self.nodes.get(id.0)
    }

    /// Children of `parent`, or the top-level boxes for `None`.
    pub fn children(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => &self.nodes[id.0].children,
            None => &self.roots,
        }
    }

    pub fn children_of_type(
        &self,
        parent: Option<NodeId>,
        typ: FourCC,
    ) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent)
            .iter()
            .copied()
            .filter(move |&id| self.nodes[id.0].typ == typ)
    }

    /// Number of ancestors of `id`.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = self.nodes[id.0].parent;
        while let Some(p) = cur {
            depth += 1;
            cur = self.nodes[p.0].parent;
        }
        depth
    }

    /// All nodes in pre-order, the order they appear in the file.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
            Some(id)
        })
    }

    /// Every node matching a `/`-separated type path, e.g. `moov/trak/tkhd`.
    pub fn find_all(&self, path: &str) -> Vec<NodeId> {
        let mut current: Vec<Option<NodeId>> = vec![None];
        for step in path.split('/').filter(|s| !s.is_empty()) {
            let Some(typ) = FourCC::parse(step) else {
                return Vec::new();
            };
            current = current
                .into_iter()
                .flat_map(|p| self.children_of_type(p, typ).map(Some).collect::<Vec<_>>())
                .collect();
        }
        current.into_iter().flatten().collect()
    }

    /// First node matching a type path.
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        self.find_all(path).into_iter().next()
    }

    /// Every recorded error, in file order, followed by the top-level error.
    pub fn issues(&self) -> impl Iterator<Item = (Option<NodeId>, &Error)> + '_ {
        self.iter()
            .filter_map(|id| self.nodes[id.0].error.as_ref().map(|e| (Some(id), e)))
            .chain(self.error.iter().map(|e| (None, e)))
    }

    pub fn has_issues(&self) -> bool {
        self.issues().next().is_some()
    }

    /// Display name of a metadata item (a child of `ilst`).
    ///
    /// Items whose type is an index into the `keys` table of the enclosing
    /// `meta` resolve to the key name. Other items use their own code.
    pub fn item_name(&self, id: NodeId) -> Option<String> {
        let node = &self.nodes[id.0];
        let ilst = node.parent?;
        if self.nodes[ilst.0].typ != FourCC(*b"ilst") {
            return None;
        }
        let keyed = self
            .nodes[ilst.0]
            .parent
            .and_then(|meta| self.metadata_keys(meta))
            .and_then(|keys| keys.get(node.typ.as_u32()))
            .map(|k| k.name_lossy());
        Some(keyed.unwrap_or_else(|| node.typ.as_str_lossy()))
    }

    fn metadata_keys(&self, meta: NodeId) -> Option<&MetadataKeys> {
        self.children_of_type(Some(meta), FourCC(*b"keys"))
            .find_map(|id| match self.nodes[id.0].record() {
                Some(Record::MetadataKeys(k)) => Some(k),
                _ => None,
            })
    }
}

struct Builder<'a> {
    registry: &'a Registry,
    max_depth: usize,
    nodes: Vec<BoxNode>,
}

impl Builder<'_> {
    /// Decode every sibling box in `window`. Returns the ids decoded before
    /// any structural error, and that error.
    fn walk(
        &mut self,
        window: ByteWindow,
        parent: Option<NodeId>,
        depth: usize,
    ) -> (Vec<NodeId>, Option<Error>) {
        let mut ids = Vec::new();
        for item in BoxWalker::new(window) {
            match item {
                Ok(raw) => ids.push(self.add(raw, parent, depth)),
                Err(e) => return (ids, Some(e)),
            }
        }
        (ids, None)
    }

    fn add(&mut self, raw: RawBox, parent: Option<NodeId>, depth: usize) -> NodeId {
        let hdr = raw.header;
        let id = NodeId(self.nodes.len());
        self.nodes.push(BoxNode {
            typ: hdr.typ,
            start: hdr.start,
            size: hdr.size,
            header_size: hdr.header_size,
            parent,
            children: Vec::new(),
            content: Content::Unparsed(raw.content.clone()),
            error: None,
        });

        let registry = self.registry;
        let parent_typ = parent.map(|p| self.nodes[p.0].typ);
        let Some(entry) = registry.lookup(parent_typ, hdr.typ) else {
            return id;
        };
        tracing::debug!(typ = %hdr.typ, start = hdr.start, handler = entry.name, "decode");

        match &entry.handler {
            Handler::Container { skip } => {
                if depth >= self.max_depth {
                    tracing::warn!(typ = %hdr.typ, start = hdr.start, "nesting limit reached");
                    self.nodes[id.0].error = Some(Error::DepthExceeded {
                        start: hdr.start,
                        limit: self.max_depth,
                    });
                    return id;
                }
                let inner = match raw.content.tail(*skip) {
                    Ok(w) => w,
                    Err(_) => {
                        self.nodes[id.0].error = Some(Error::DecodeAssumption {
                            typ: hdr.typ,
                            start: hdr.start,
                            reason: format!("content shorter than its {skip}-byte prefix"),
                        });
                        return id;
                    }
                };
                self.nodes[id.0].content = Content::Container;
                let (children, error) = self.walk(inner, Some(id), depth + 1);
                if let Some(e) = &error {
                    tracing::warn!(typ = %hdr.typ, start = hdr.start, error = %e, "subtree abandoned");
                }
                let node = &mut self.nodes[id.0];
                node.children = children;
                node.error = error;
            }
            Handler::Leaf(decoder) => {
                let mut content = raw.content;
                match decoder.decode(&hdr, &mut content) {
                    Ok(record) => self.nodes[id.0].content = Content::Record(record),
                    Err(e) => {
                        tracing::debug!(typ = %hdr.typ, start = hdr.start, error = %e, "decode failed");
                        self.nodes[id.0].error = Some(e);
                    }
                }
            }
        }
        id
    }
}
