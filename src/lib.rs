pub mod boxes;
pub mod check;
pub mod config;
pub mod decoders;
pub mod error;
pub mod known_boxes;
pub mod registry;
pub mod report;
pub mod selector;
pub mod tree;
pub mod util;
pub mod walker;
pub mod window;

pub use boxes::{BoxHeader, FourCC};
pub use check::{Status, check_file, classify};
pub use config::{CheckOptions, ParseOptions};
pub use decoders::Record;
pub use error::{Error, ErrorClass, Result};
pub use registry::{BoxDecoder, BoxKey, Registry, default_registry};
pub use selector::{Selection, Selector, select};
pub use tree::{BoxNode, BoxTree, Content, NodeId};
pub use walker::{BoxWalker, RawBox, parse_children, read_box_header};
pub use window::{ByteWindow, Layout};
