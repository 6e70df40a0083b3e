//! Rendering options and configuration.

use serde::{Deserialize, Serialize};

/// Options for writing TEI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Title for `titleStmt/title`; falls back to the document metadata
    pub title: Option<String>,

    /// Value of `xml:lang` on the `TEI` root
    pub language: Option<String>,

    /// Target of an `xml-stylesheet` processing instruction
    pub stylesheet: Option<String>,

    /// NFC-normalize text and attribute values on output
    pub normalize_unicode: bool,

    /// Indent block-level elements (inline content is never reindented)
    pub indent: bool,

    /// Prefix of apparatus ids (`app1`, `app2`, ...)
    pub apparatus_id_prefix: String,

    /// Prefix of comment ids (`c1`, `c2`, ...)
    pub comment_id_prefix: String,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the document language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Add an `xml-stylesheet` processing instruction.
    pub fn with_stylesheet(mut self, href: impl Into<String>) -> Self {
        self.stylesheet = Some(href.into());
        self
    }

    /// Enable or disable NFC normalization.
    pub fn with_normalize_unicode(mut self, normalize: bool) -> Self {
        self.normalize_unicode = normalize;
        self
    }

    /// Enable or disable block indentation.
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Set the id prefixes for apparatus entries and comments.
    pub fn with_id_prefixes(
        mut self,
        apparatus: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        self.apparatus_id_prefix = apparatus.into();
        self.comment_id_prefix = comment.into();
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: None,
            language: None,
            stylesheet: None,
            normalize_unicode: true,
            indent: true,
            apparatus_id_prefix: "app".to_string(),
            comment_id_prefix: "c".to_string(),
        }
    }
}
