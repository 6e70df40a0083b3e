//! OpenDocument source detection.

use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Kind of OpenDocument markup the engine was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `content.xml` part extracted from an `.odt`/`.sxw` container
    ContentXml,
    /// Single-file flat document (`.fodt`)
    FlatOdt,
}

/// Detected source format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFormat {
    /// Which root element was found
    pub kind: SourceKind,
    /// `office:version` attribute, if present
    pub version: Option<String>,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            SourceKind::ContentXml => "OpenDocument content part",
            SourceKind::FlatOdt => "flat OpenDocument text",
        };
        match &self.version {
            Some(v) => write!(f, "{} {}", kind, v),
            None => write!(f, "{}", kind),
        }
    }
}

/// How many leading bytes are enough to find the root element.
const SNIFF_LEN: usize = 8 * 1024;

/// Detect the source format from a file path.
///
/// # Example
/// ```no_run
/// use odtei::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("content.xml").unwrap();
/// println!("{}", format);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<SourceFormat> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    BufReader::new(file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    detect_format_from_bytes(&head)
}

/// Detect the source format from the leading bytes of a document.
///
/// Only the root start tag is inspected, so a truncated prefix is fine.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<SourceFormat> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let kind = match e.name().as_ref() {
                    b"office:document-content" => SourceKind::ContentXml,
                    b"office:document" => SourceKind::FlatOdt,
                    other => {
                        return Err(Error::MalformedSource(format!(
                            "root element <{}> is not an OpenDocument root",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                let version = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"office:version")
                    .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
                return Ok(SourceFormat { kind, version });
            }
            Ok(Event::Eof) => {
                return Err(Error::MalformedSource("no root element".to_string()));
            }
            Err(e) => return Err(Error::MalformedSource(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Check if bytes look like an OpenDocument source.
pub fn is_opendocument_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
