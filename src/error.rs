//! Error types for the odtei engine.

use std::io;
use thiserror::Error;

/// Result type alias for odtei operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that escape the conversion engine.
///
/// Annotation-level problems never show up here: grammar failures and
/// unplaceable annotations are absorbed into the ledgers of a conversion.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading sources or writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source markup does not parse; fatal for the document.
    #[error("Malformed source: {0}")]
    MalformedSource(String),

    /// A style identifier appears in both the apparatus and the comment set.
    #[error("Style \"{0}\" is configured as both an apparatus style and a comment style")]
    ConfigConflict(String),

    /// The configuration is unusable for another reason (bad regex, empty set).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal invariant violation while writing TEI.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error is fatal for a single document only.
    ///
    /// Configuration errors are fatal for the whole run, before any document
    /// is processed.
    pub fn is_document_fatal(&self) -> bool {
        matches!(
            self,
            Error::MalformedSource(_) | Error::Serialization(_) | Error::Io(_)
        )
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(e) => Error::Io(io::Error::new(e.kind(), e.to_string())),
            _ => Error::MalformedSource(err.to_string()),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ConfigConflict("Apparatus".to_string());
        assert_eq!(
            err.to_string(),
            "Style \"Apparatus\" is configured as both an apparatus style and a comment style"
        );

        let err = Error::MalformedSource("unexpected end of input".to_string());
        assert_eq!(err.to_string(), "Malformed source: unexpected end of input");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_document_fatal());
    }

    #[test]
    fn test_regex_error_is_config_error() {
        let err: Error = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!err.is_document_fatal());
    }
}
