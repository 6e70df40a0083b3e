//! Parsing options and configuration.

use serde::{Deserialize, Serialize};

/// Options for parsing OpenDocument sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Collapse XML whitespace in text content to single spaces
    pub collapse_whitespace: bool,

    /// Drop paragraphs that carry neither text nor annotation markers
    pub skip_empty_paragraphs: bool,

    /// Read `office:meta` (title, author, language) from flat documents
    pub read_metadata: bool,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable whitespace collapsing.
    pub fn with_collapse_whitespace(mut self, collapse: bool) -> Self {
        self.collapse_whitespace = collapse;
        self
    }

    /// Keep text content exactly as written in the XML.
    pub fn preserve_whitespace(mut self) -> Self {
        self.collapse_whitespace = false;
        self
    }

    /// Enable or disable dropping of empty paragraphs.
    pub fn with_skip_empty_paragraphs(mut self, skip: bool) -> Self {
        self.skip_empty_paragraphs = skip;
        self
    }

    /// Enable or disable metadata extraction.
    pub fn with_metadata(mut self, read: bool) -> Self {
        self.read_metadata = read;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            skip_empty_paragraphs: false,
            read_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_builder() {
        let options = ParseOptions::new()
            .preserve_whitespace()
            .with_skip_empty_paragraphs(true)
            .with_metadata(false);

        assert!(!options.collapse_whitespace);
        assert!(options.skip_empty_paragraphs);
        assert!(!options.read_metadata);
    }

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert!(options.collapse_whitespace);
        assert!(!options.skip_empty_paragraphs);
        assert!(options.read_metadata);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: ParseOptions =
            serde_json::from_str(r#"{"skip_empty_paragraphs": true}"#).unwrap();
        assert!(options.collapse_whitespace);
        assert!(options.skip_empty_paragraphs);
    }
}
