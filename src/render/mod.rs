//! Rendering: annotated tree, TEI serialization, ledgers and reports.

mod json;
pub mod ledger;
mod options;
mod result;
pub mod tei;
pub mod tree;

pub use json::{to_json, JsonFormat};
pub use options::RenderOptions;
pub use result::ConversionStats;
pub use tei::{apparatus_fragment, to_tei, TeiSerializer};
pub use tree::{AnnotatedTree, Block, Node, PlacedSpan, SpanBody};
