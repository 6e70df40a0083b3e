//! Document model types for OpenDocument manuscripts.
//!
//! This module defines the intermediate representation that bridges source
//! parsing and TEI rendering: paragraphs with styled runs and inline
//! annotation markers, plus the raw annotations the markers point to.

mod annotation;
mod document;
mod paragraph;

pub use annotation::{
    AnnotationId, AnnotationKind, AnnotationSource, ApparatusEntry, MarkerId, RawAnnotation,
    Reading,
};
pub use document::{Document, Metadata};
pub use paragraph::{InlineContent, Paragraph, ParagraphStyle, TextRun, TextStyle};
