//! # odtei
//!
//! Converts critical-edition manuscripts written in OpenDocument text into
//! TEI P5, with editorial comments and critical-apparatus entries placed on
//! the text they annotate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use odtei::{config::EngineConfig, convert::Engine, OutputSet};
//!
//! fn main() -> odtei::Result<()> {
//!     let engine = Engine::new(
//!         EngineConfig::default()
//!             .with_apparatus_styles(["Apparatus"])
//!             .with_comment_styles(["Comment"]),
//!     )?;
//!
//!     let conversion = engine.convert_file("labyrint/content.xml")?;
//!     println!("{}: {} placed", conversion.status(), conversion.stats.placed_count);
//!
//!     OutputSet::for_input("out", "labyrint/content.xml").persist(&conversion)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Annotation recovery**: comments, footnotes and ranged annotations
//! - **Apparatus grammar**: lemma, readings, sigla, omissions and notes
//! - **Honest ledgers**: nothing is dropped without a record
//! - **Normalization**: editorial control codes removed without moving anchors
//! - **Parallel batches**: uses Rayon across documents

pub mod annotate;
pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use annotate::{GrammarError, Ledger, LossReason, PlacementOutcome, ProblemReason};
pub use config::{
    AttachSide, EngineConfig, NestingOrder, NormalizationRule, RuleAction, Settings, UnitRule,
};
pub use convert::{Artifact, Conversion, ConversionStatus, Engine, OutputSet};
pub use detect::{detect_format_from_bytes, detect_format_from_path, SourceFormat, SourceKind};
pub use error::{Error, Result};
pub use model::{
    AnnotationId, ApparatusEntry, Document, InlineContent, Metadata, Paragraph, RawAnnotation,
    Reading, TextRun, TextStyle,
};
pub use parser::{ParseOptions, SourceParser};
pub use render::{ConversionStats, JsonFormat, RenderOptions};

use std::path::Path;

/// Parse a `content.xml` part or flat `.fodt` file into a document.
///
/// # Example
///
/// ```no_run
/// use odtei::parse_file;
///
/// let doc = parse_file("content.xml").unwrap();
/// println!("Annotations: {}", doc.annotation_count());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    SourceParser::new().parse_file(path)
}

/// Parse a source file with custom options.
pub fn parse_file_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Document> {
    SourceParser::with_options(options).parse_file(path)
}

/// Parse source markup from bytes.
pub fn parse_bytes(data: &[u8]) -> Result<Document> {
    SourceParser::new().parse_bytes(data)
}

/// Parse source markup from bytes with custom options.
pub fn parse_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<Document> {
    SourceParser::with_options(options).parse_bytes(data)
}

/// Parse source markup held in a string.
pub fn parse_str(xml: &str) -> Result<Document> {
    SourceParser::new().parse_str(xml)
}

/// Parse source markup held in a string with custom options.
pub fn parse_str_with_options(xml: &str, options: ParseOptions) -> Result<Document> {
    SourceParser::with_options(options).parse_str(xml)
}

/// Convert source markup with the default configuration.
///
/// # Example
///
/// ```no_run
/// use odtei::convert_str;
///
/// let xml = std::fs::read_to_string("content.xml").unwrap();
/// let conversion = convert_str(&xml).unwrap();
/// std::fs::write("out.tei.xml", &conversion.tei).unwrap();
/// ```
pub fn convert_str(xml: &str) -> Result<Conversion> {
    Engine::new(EngineConfig::default())?.convert_str(xml)
}

/// Convert a source file with the default configuration.
pub fn convert_file<P: AsRef<Path>>(path: P) -> Result<Conversion> {
    Engine::new(EngineConfig::default())?.convert_file(path)
}
