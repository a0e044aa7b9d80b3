use crate::boxes::{BoxHeader, FourCC};
use crate::decoders::Record;
use crate::decoders::headers::{
    ElstDecoder, FtypDecoder, HdlrDecoder, MdhdDecoder, MvhdDecoder, TkhdDecoder,
};
use crate::decoders::metadata::{DataDecoder, KeysDecoder};
use crate::decoders::sample_entry::StsdDecoder;
use crate::decoders::tables::{
    ChunkOffsetDecoder, CttsDecoder, StscDecoder, StssDecoder, StszDecoder, SttsDecoder,
};
use crate::decoders::vendor::UuidDecoder;
use crate::error::Result;
use crate::window::ByteWindow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// How a box is looked up: by its type alone, by its type under a specific
/// parent, or as any child of a given parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKey {
    Type(FourCC),
    Nested { parent: FourCC, typ: FourCC },
    AnyUnder(FourCC),
}

impl BoxKey {
    pub fn of(typ: &[u8; 4]) -> Self {
        BoxKey::Type(FourCC(*typ))
    }

    pub fn nested(parent: &[u8; 4], typ: &[u8; 4]) -> Self {
        BoxKey::Nested {
            parent: FourCC(*parent),
            typ: FourCC(*typ),
        }
    }
}

/// Trait for leaf box decoders.
///
/// A decoder receives the box header and a window over the box content, and
/// returns a structured [`Record`]. Any unexpected version, flag or reserved
/// value is reported as a decode assumption error, never guessed around.
pub trait BoxDecoder: Send + Sync {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record>;
}

pub enum Handler {
    /// Content is a sequence of child boxes after `skip` leading bytes.
    Container { skip: u64 },
    Leaf(Box<dyn BoxDecoder>),
}

pub struct Entry {
    pub name: &'static str,
    pub handler: Handler,
}

/// Decoders and containers keyed by [`BoxKey`].
///
/// The registry is immutable once constructed; use [`Registry::with_decoder`]
/// and [`Registry::with_container`] to build it fluently.
pub struct Registry {
    map: HashMap<BoxKey, Entry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Return a new registry with the given decoder added.
    ///
    /// `name` is human-readable and used only for logging.
    pub fn with_decoder(mut self, key: BoxKey, name: &'static str, dec: Box<dyn BoxDecoder>) -> Self {
        self.map.insert(
            key,
            Entry {
                name,
                handler: Handler::Leaf(dec),
            },
        );
        self
    }

    /// Return a new registry that treats `key` as a container whose children
    /// start `skip` bytes into the content.
    pub fn with_container(mut self, key: BoxKey, skip: u64) -> Self {
        let name = match key {
            BoxKey::Type(_) => "container",
            BoxKey::Nested { .. } => "nested container",
            BoxKey::AnyUnder(_) => "item container",
        };
        self.map.insert(
            key,
            Entry {
                name,
                handler: Handler::Container { skip },
            },
        );
        self
    }

    /// Find the handler for `typ` appearing under `parent` (`None` at top
    /// level). Parent-qualified keys win over wildcards, which win over the
    /// plain type.
    pub fn lookup(&self, parent: Option<FourCC>, typ: FourCC) -> Option<&Entry> {
        parent
            .and_then(|parent| {
                self.map
                    .get(&BoxKey::Nested { parent, typ })
                    .or_else(|| self.map.get(&BoxKey::AnyUnder(parent)))
            })
            .or_else(|| self.map.get(&BoxKey::Type(typ)))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The shared default registry, built on first use.
    pub fn standard() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(default_registry)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

const CONTAINERS: &[&[u8; 4]] = &[
    b"moov", b"trak", b"edts", b"mdia", b"minf", b"stbl", b"udta", b"dinf", b"ilst", b"moof",
    b"traf", b"mvex", b"mfra", b"sinf", b"schi", b"tref", b"TSCM",
];

// ---------- Default registry ----------
pub fn default_registry() -> Registry {
    let mut reg = Registry::new();
    for typ in CONTAINERS {
        reg = reg.with_container(BoxKey::of(typ), 0);
    }

    reg.with_container(BoxKey::AnyUnder(FourCC(*b"ilst")), 0)
        // ISO meta is a full box, QuickTime moov/meta is not
        .with_container(BoxKey::of(b"meta"), 4)
        .with_container(BoxKey::nested(b"moov", b"meta"), 0)
        .with_container(BoxKey::of(b"dref"), 8)
        .with_decoder(BoxKey::of(b"ftyp"), "ftyp", Box::new(FtypDecoder))
        .with_decoder(BoxKey::of(b"mvhd"), "mvhd", Box::new(MvhdDecoder))
        .with_decoder(BoxKey::of(b"tkhd"), "tkhd", Box::new(TkhdDecoder))
        .with_decoder(BoxKey::of(b"mdhd"), "mdhd", Box::new(MdhdDecoder))
        .with_decoder(BoxKey::of(b"hdlr"), "hdlr", Box::new(HdlrDecoder))
        .with_decoder(BoxKey::of(b"elst"), "elst", Box::new(ElstDecoder))
        .with_decoder(
            BoxKey::of(b"stco"),
            "stco",
            Box::new(ChunkOffsetDecoder { wide: false }),
        )
        .with_decoder(
            BoxKey::of(b"co64"),
            "co64",
            Box::new(ChunkOffsetDecoder { wide: true }),
        )
        .with_decoder(BoxKey::of(b"stss"), "stss", Box::new(StssDecoder))
        .with_decoder(BoxKey::of(b"stsz"), "stsz", Box::new(StszDecoder))
        .with_decoder(BoxKey::of(b"stts"), "stts", Box::new(SttsDecoder))
        .with_decoder(BoxKey::of(b"ctts"), "ctts", Box::new(CttsDecoder))
        .with_decoder(BoxKey::of(b"stsc"), "stsc", Box::new(StscDecoder))
        .with_decoder(BoxKey::of(b"stsd"), "stsd", Box::new(StsdDecoder))
        .with_decoder(BoxKey::of(b"keys"), "keys", Box::new(KeysDecoder))
        .with_decoder(BoxKey::of(b"data"), "data", Box::new(DataDecoder))
        .with_decoder(BoxKey::of(b"uuid"), "uuid", Box::new(UuidDecoder))
        .with_decoder(BoxKey::nested(b"TSCM", b"DATA"), "vendor data", Box::new(UuidDecoder))
}
