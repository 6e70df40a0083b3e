//! Annotation types shared by the parser and the placement engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of an annotation, assigned in document order starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnnotationId(pub u32);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an inline annotation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub u32);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Source construct an annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    /// `office:annotation` (word-processor comment)
    Comment,
    /// `text:note` with note class `footnote`
    Footnote,
    /// `text:note` with note class `endnote`
    Endnote,
}

/// An annotation exactly as found in the source, one per marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnnotation {
    /// Document-order identifier
    pub id: AnnotationId,

    /// Source name (`office:name` or `text:id`), if any
    pub name: Option<String>,

    /// Style of the annotation body, as written in the source
    pub style_name: Option<String>,

    /// `style_name` followed by its parent styles
    pub style_chain: Vec<String>,

    /// Marker anchoring this annotation in the body
    pub marker: MarkerId,

    /// Body text, paragraphs joined by newlines
    pub raw_text: String,

    /// Which source construct produced the annotation
    pub source: AnnotationSource,

    /// Author (`dc:creator`)
    pub author: Option<String>,

    /// Creation date (`dc:date`)
    pub date: Option<NaiveDateTime>,

    /// Note citation (`text:note-citation`)
    pub citation: Option<String>,
}

impl RawAnnotation {
    /// Create a comment annotation with the given style and text.
    pub fn new(id: u32, style: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let style = style.into();
        Self {
            id: AnnotationId(id),
            name: None,
            style_name: Some(style.clone()),
            style_chain: vec![style],
            marker: MarkerId(id),
            raw_text: raw_text.into(),
            source: AnnotationSource::Comment,
            author: None,
            date: None,
            citation: None,
        }
    }

    /// Style name for display, `-` when the annotation has none.
    pub fn style_label(&self) -> &str {
        self.style_name.as_deref().unwrap_or("-")
    }
}

/// Result of the annotation classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Editorial comment
    Comment,
    /// Critical-apparatus entry
    ApparatusEntry,
    /// Style matches neither configured set
    Unclassifiable,
}

/// A fully parsed critical-apparatus entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApparatusEntry {
    /// Leading entry number (line number in printed editions)
    pub number: Option<u32>,

    /// Lemma text as written in the entry
    pub lemma: String,

    /// Witnesses attesting the lemma
    pub lemma_sigla: Vec<String>,

    /// Every witness mentioned by the entry
    pub sigla: BTreeSet<String>,

    /// Variant readings in written order, never empty
    pub readings: Vec<Reading>,

    /// Free-text commentary
    pub note: Option<String>,
}

/// A variant reading attributed to one or more witnesses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Canonical witness ids in written order
    pub sigla: Vec<String>,

    /// Reading text, empty for omissions
    pub text: String,

    /// The witnesses omit the lemma
    pub omission: bool,
}

impl Reading {
    /// Create a reading with text.
    pub fn new(text: impl Into<String>, sigla: Vec<String>) -> Self {
        Self {
            sigla,
            text: text.into(),
            omission: false,
        }
    }

    /// Create an omission reading.
    pub fn omission(sigla: Vec<String>) -> Self {
        Self {
            sigla,
            text: String::new(),
            omission: true,
        }
    }
}
