//! Document-level types.

use super::{AnnotationId, MarkerId, Paragraph, RawAnnotation};
use serde::{Deserialize, Serialize};

/// A parsed OpenDocument manuscript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata
    pub metadata: Metadata,

    /// Body paragraphs and headings in document order
    pub paragraphs: Vec<Paragraph>,

    /// Annotations in document order, one per marker
    pub annotations: Vec<RawAnnotation>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            metadata: Metadata::default(),
            paragraphs: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Add a paragraph to the document.
    pub fn add_paragraph(&mut self, paragraph: Paragraph) {
        self.paragraphs.push(paragraph);
    }

    /// Register an annotation, assigning the next id and marker.
    ///
    /// Returns the marker the caller must place in the body.
    pub fn push_annotation(&mut self, mut annotation: RawAnnotation) -> MarkerId {
        let next = self.annotations.len() as u32 + 1;
        annotation.id = AnnotationId(next);
        annotation.marker = MarkerId(next);
        self.annotations.push(annotation);
        MarkerId(next)
    }

    /// Get an annotation by id.
    pub fn annotation(&self, id: AnnotationId) -> Option<&RawAnnotation> {
        self.annotations.get((id.0 as usize).checked_sub(1)?)
    }

    /// Number of paragraphs.
    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Number of annotations.
    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Check if the document has no paragraphs.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Document metadata (from `office:meta` in flat documents).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title (`dc:title`)
    pub title: Option<String>,

    /// Initial author (`meta:initial-creator` or `dc:creator`)
    pub author: Option<String>,

    /// Document language (`dc:language`)
    pub language: Option<String>,

    /// Whether the input was a flat single-file document
    pub flat: bool,
}
