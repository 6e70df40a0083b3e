//! Paragraph and text-level types.

use serde::{Deserialize, Serialize};

use super::MarkerId;

/// A paragraph (or heading) of the source body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    /// Runs, breaks and annotation markers in document order
    pub content: Vec<InlineContent>,

    /// Paragraph style
    pub style: ParagraphStyle,
}

impl Paragraph {
    /// Create a new empty paragraph.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            style: ParagraphStyle::default(),
        }
    }

    /// Create a paragraph with plain text.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_text(text);
        p
    }

    /// Create a heading paragraph.
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        let mut p = Self::with_text(text);
        p.style.heading_level = Some(level.clamp(1, 10));
        p
    }

    /// Add plain text to the paragraph.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.add_run(TextRun::new(text));
    }

    /// Add a styled text run, merging it into the previous run when the
    /// styles are identical.
    pub fn add_run(&mut self, run: TextRun) {
        if run.is_empty() {
            return;
        }
        if let Some(InlineContent::Text(last)) = self.content.last_mut() {
            if last.style == run.style {
                last.text.push_str(&run.text);
                return;
            }
        }
        self.content.push(InlineContent::Text(run));
    }

    /// Add a line break.
    pub fn add_line_break(&mut self) {
        self.content.push(InlineContent::LineBreak);
    }

    /// Add an annotation marker.
    pub fn add_marker(&mut self, marker: MarkerId) {
        self.content.push(InlineContent::Marker(marker));
    }

    /// Add the closing end of a ranged annotation.
    pub fn add_marker_end(&mut self, marker: MarkerId) {
        self.content.push(InlineContent::MarkerEnd(marker));
    }

    /// Get plain text content of the paragraph.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                InlineContent::Text(run) => Some(run.text.as_str()),
                InlineContent::LineBreak => Some("\n"),
                InlineContent::Marker(_) | InlineContent::MarkerEnd(_) => None,
            })
            .collect()
    }

    /// Length of the paragraph in characters, line breaks counting as one.
    pub fn char_len(&self) -> usize {
        self.content
            .iter()
            .map(|c| match c {
                InlineContent::Text(run) => run.text.chars().count(),
                InlineContent::LineBreak => 1,
                InlineContent::Marker(_) | InlineContent::MarkerEnd(_) => 0,
            })
            .sum()
    }

    /// Markers contained in this paragraph, in document order.
    pub fn markers(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.content.iter().filter_map(|c| match c {
            InlineContent::Marker(id) => Some(*id),
            _ => None,
        })
    }

    /// Check whether the paragraph carries neither text nor markers.
    pub fn is_empty(&self) -> bool {
        self.content.iter().all(|c| match c {
            InlineContent::Text(run) => run.text.trim().is_empty(),
            InlineContent::LineBreak => true,
            InlineContent::Marker(_) | InlineContent::MarkerEnd(_) => false,
        })
    }

    /// Check if this is a heading.
    pub fn is_heading(&self) -> bool {
        self.style.heading_level.is_some()
    }
}

impl Default for Paragraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Inline content within a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineContent {
    /// A text run with styling
    Text(TextRun),

    /// A line break
    LineBreak,

    /// Position of an annotation (`office:annotation` or `text:note`)
    Marker(MarkerId),

    /// End of a ranged annotation (`office:annotation-end`)
    MarkerEnd(MarkerId),
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Text styling
    pub style: TextStyle,
}

impl TextRun {
    /// Create a new text run with default style.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }

    /// Create a text run with the given style.
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Create an italic text run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                italic: true,
                ..Default::default()
            },
        )
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Character styling that survives into TEI as `hi/@rend`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    pub bold: bool,

    /// Italic text
    pub italic: bool,

    /// Underlined text
    pub underline: bool,

    /// Letter-spaced text (Sperrsatz)
    pub spaced: bool,

    /// Superscript
    pub superscript: bool,

    /// Subscript
    pub subscript: bool,
}

impl TextStyle {
    /// Check if any styling is applied.
    pub fn has_styling(&self) -> bool {
        self.bold
            || self.italic
            || self.underline
            || self.spaced
            || self.superscript
            || self.subscript
    }

    /// Combine two styles, as nested spans do.
    pub fn merge(self, other: TextStyle) -> TextStyle {
        TextStyle {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
            spaced: self.spaced || other.spaced,
            superscript: self.superscript || other.superscript,
            subscript: self.subscript || other.subscript,
        }
    }

    /// Space-separated `rend` tokens in a fixed order.
    pub fn rend(&self) -> String {
        let mut tokens = Vec::new();
        if self.bold {
            tokens.push("bold");
        }
        if self.italic {
            tokens.push("italic");
        }
        if self.underline {
            tokens.push("underline");
        }
        if self.spaced {
            tokens.push("spaced");
        }
        if self.superscript {
            tokens.push("superscript");
        }
        if self.subscript {
            tokens.push("subscript");
        }
        tokens.join(" ")
    }
}

/// Paragraph styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Source style name (`text:style-name`)
    pub name: Option<String>,

    /// Outline level for headings, None for body paragraphs
    pub heading_level: Option<u8>,
}
