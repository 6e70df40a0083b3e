//! OpenDocument parsing module.

mod options;
mod source_parser;
mod styles;

pub use options::ParseOptions;
pub use source_parser::SourceParser;
pub use styles::{decode_style_name, StyleDef, StyleFamily, StyleSheet};
