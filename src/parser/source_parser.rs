//! OpenDocument markup parser.
//!
//! Reads the `content.xml` part of a container or a flat `.fodt` document
//! and produces a [`Document`]: paragraphs of styled runs with inline
//! markers, plus the annotations those markers point to.

use super::styles::{StyleDef, StyleFamily, StyleSheet};
use super::ParseOptions;
use crate::error::{Error, Result};
use crate::model::{
    AnnotationId, AnnotationSource, Document, InlineContent, MarkerId, Paragraph, RawAnnotation,
    TextRun, TextStyle,
};
use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

/// Elements whose whole subtree never contributes to the output.
const SKIPPED: &[&[u8]] = &[
    b"text:tracked-changes",
    b"text:sequence-decls",
    b"text:variable-decls",
    b"text:user-field-decls",
    b"office:forms",
    b"draw:frame",
    b"office:scripts",
    b"office:font-face-decls",
    b"office:master-styles",
];

/// Upper bound for the repeat count of a single `text:s`.
pub const MAX_SPACES: usize = 1024;

/// OpenDocument parser.
pub struct SourceParser {
    options: ParseOptions,
}

impl SourceParser {
    /// Create a parser with default options.
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Create a parser with custom options.
    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parse options in effect.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a source file.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Document> {
        let path = path.as_ref();
        log::debug!("parsing {}", path.display());
        let data = std::fs::read(path)?;
        self.parse_bytes(&data)
    }

    /// Parse source markup held in a string.
    pub fn parse_str(&self, xml: &str) -> Result<Document> {
        self.parse_bytes(xml.as_bytes())
    }

    /// Parse source markup from bytes.
    pub fn parse_bytes(&self, data: &[u8]) -> Result<Document> {
        let mut reader = Reader::from_reader(data);
        reader.trim_text(false);

        let mut state = ParseState::new(&self.options);
        let mut buf = Vec::new();
        let mut skip_buf = Vec::new();
        let mut depth = 0usize;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    if depth == 0 {
                        state.check_root(&e)?;
                    }
                    let skipped = SKIPPED.iter().any(|s| *s == e.name().as_ref());
                    if skipped || state.skips_nested(&e) {
                        let name = e.name().as_ref().to_vec();
                        reader.read_to_end_into(QName(&name), &mut skip_buf)?;
                        skip_buf.clear();
                    } else {
                        depth += 1;
                        state.start(&e, false)?;
                    }
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        state.check_root(&e)?;
                    }
                    state.start(&e, true)?;
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    state.end(e.name().as_ref());
                }
                Event::Text(e) => {
                    let text = e.unescape()?;
                    state.text(&text);
                }
                Event::CData(e) => {
                    let raw = e.into_inner();
                    state.text(&String::from_utf8_lossy(&raw));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if depth != 0 {
            return Err(Error::MalformedSource(format!(
                "unexpected end of document with {} unclosed element(s)",
                depth
            )));
        }

        state.finish()
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A paragraph being assembled.
struct ParagraphBuilder {
    paragraph: Paragraph,
    styles: Vec<TextStyle>,
    last_space: bool,
    collapsible_tail: bool,
}

impl ParagraphBuilder {
    fn new(paragraph: Paragraph, base: TextStyle) -> Self {
        Self {
            paragraph,
            styles: vec![base],
            last_space: true,
            collapsible_tail: false,
        }
    }

    fn style(&self) -> TextStyle {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_text(&mut self, text: &str, collapse: bool) {
        let text = if collapse {
            collapse_whitespace(text, &mut self.last_space)
        } else {
            self.last_space = text.ends_with(char::is_whitespace);
            text.to_string()
        };
        if text.is_empty() {
            return;
        }
        self.collapsible_tail = collapse && text.ends_with(' ');
        let style = self.style();
        self.paragraph.add_run(TextRun::styled(text, style));
    }

    fn push_literal(&mut self, text: &str) {
        let style = self.style();
        self.paragraph.add_run(TextRun::styled(text, style));
        self.last_space = true;
        self.collapsible_tail = false;
    }

    fn push_line_break(&mut self) {
        self.paragraph.add_line_break();
        self.last_space = true;
        self.collapsible_tail = false;
    }

    fn finish(mut self, collapse: bool) -> Paragraph {
        if collapse {
            if let Some(InlineContent::Text(run)) = self.paragraph.content.last_mut() {
                if self.collapsible_tail && run.text.ends_with(' ') {
                    run.text.pop();
                }
                if run.text.is_empty() {
                    self.paragraph.content.pop();
                }
            }
        }
        self.paragraph
    }
}

/// Which part of a captured annotation text goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Body,
    Creator,
    Date,
    Citation,
}

/// An annotation or note body being collected.
struct Capture {
    source: AnnotationSource,
    end_tag: &'static [u8],
    name: Option<String>,
    field: Field,
    author: String,
    date: String,
    citation: String,
    style: Option<String>,
    class_style: Option<String>,
    paragraphs: Vec<String>,
    current: Option<String>,
    last_space: bool,
}

impl Capture {
    fn new(source: AnnotationSource, end_tag: &'static [u8], name: Option<String>) -> Self {
        Self {
            source,
            end_tag,
            name,
            field: Field::Body,
            author: String::new(),
            date: String::new(),
            citation: String::new(),
            style: None,
            class_style: None,
            paragraphs: Vec::new(),
            current: None,
            last_space: true,
        }
    }

    fn text(&mut self, text: &str, collapse: bool) {
        match self.field {
            Field::Creator => self.author.push_str(text),
            Field::Date => self.date.push_str(text),
            Field::Citation => self.citation.push_str(text),
            Field::Body => {
                if let Some(current) = self.current.as_mut() {
                    if collapse {
                        current.push_str(&collapse_whitespace(text, &mut self.last_space));
                    } else {
                        current.push_str(text);
                    }
                }
            }
        }
    }

    fn literal(&mut self, text: &str) {
        if let Some(current) = self.current.as_mut() {
            current.push_str(text);
            self.last_space = true;
        }
    }

    fn raw_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.trim())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaField {
    Title,
    Creator,
    Language,
}

/// Mutable state of one parse.
struct ParseState<'o> {
    options: &'o ParseOptions,
    doc: Document,
    sheet: StyleSheet,
    in_styles: bool,
    style_def: Option<StyleDef>,
    in_meta: bool,
    meta_field: Option<MetaField>,
    seen_root: bool,
    seen_text: bool,
    in_text: bool,
    paragraph: Option<ParagraphBuilder>,
    capture: Option<Capture>,
    open_ranges: HashMap<String, MarkerId>,
}

impl<'o> ParseState<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            doc: Document::new(),
            sheet: StyleSheet::new(),
            in_styles: false,
            style_def: None,
            in_meta: false,
            meta_field: None,
            seen_root: false,
            seen_text: false,
            in_text: false,
            paragraph: None,
            capture: None,
            open_ranges: HashMap::new(),
        }
    }

    fn check_root(&mut self, e: &BytesStart) -> Result<()> {
        if self.seen_root {
            return Ok(());
        }
        match e.name().as_ref() {
            b"office:document-content" => {}
            b"office:document" => self.doc.metadata.flat = true,
            other => {
                return Err(Error::MalformedSource(format!(
                    "root element <{}> is not an OpenDocument root",
                    String::from_utf8_lossy(other)
                )))
            }
        }
        self.seen_root = true;
        Ok(())
    }

    /// Annotations and notes nested in a capture are not part of its text.
    fn skips_nested(&self, e: &BytesStart) -> bool {
        self.capture.is_some()
            && matches!(e.name().as_ref(), b"office:annotation" | b"text:note")
    }

    fn start(&mut self, e: &BytesStart, empty: bool) -> Result<()> {
        let name = e.name();
        let name = name.as_ref();

        if self.in_styles {
            return self.style_start(name, e, empty);
        }
        if self.in_meta {
            self.meta_field = match name {
                b"dc:title" => Some(MetaField::Title),
                b"meta:initial-creator" | b"dc:creator" => Some(MetaField::Creator),
                b"dc:language" => Some(MetaField::Language),
                _ => None,
            };
            return Ok(());
        }
        if self.capture.is_some() {
            return self.capture_start(name, e, empty);
        }

        match name {
            b"office:automatic-styles" | b"office:styles" if !empty => self.in_styles = true,
            b"office:meta" if !empty => self.in_meta = self.options.read_metadata,
            b"office:text" => {
                self.seen_text = true;
                self.in_text = !empty;
            }
            _ if !self.in_text => {}
            b"text:p" | b"text:h" => {
                if let Some(open) = self.paragraph.take() {
                    log::warn!("paragraph opened inside another paragraph");
                    self.push_paragraph(open);
                }
                let builder = self.paragraph_builder(name, e)?;
                if empty {
                    self.push_paragraph(builder);
                } else {
                    self.paragraph = Some(builder);
                }
            }
            b"text:span" if !empty => {
                let style = match attr(e, b"text:style-name")? {
                    Some(style) => self.sheet.text_style(StyleFamily::Text, &style),
                    None => TextStyle::default(),
                };
                if let Some(p) = self.paragraph.as_mut() {
                    let merged = p.style().merge(style);
                    p.styles.push(merged);
                }
            }
            b"text:s" => {
                let count = space_count(e)?;
                if let Some(p) = self.paragraph.as_mut() {
                    p.push_literal(&" ".repeat(count));
                }
            }
            b"text:tab" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.push_literal("\t");
                }
            }
            b"text:line-break" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.push_line_break();
                }
            }
            b"office:annotation" => {
                let name = attr(e, b"office:name")?;
                let capture = Capture::new(AnnotationSource::Comment, b"office:annotation", name);
                if empty {
                    self.finish_capture(capture);
                } else {
                    self.capture = Some(capture);
                }
            }
            b"office:annotation-end" => {
                let name = attr(e, b"office:name")?;
                match name.and_then(|n| self.open_ranges.remove(&n)) {
                    Some(marker) => {
                        self.ensure_paragraph().paragraph.add_marker_end(marker);
                    }
                    None => log::warn!("annotation end without a matching annotation"),
                }
            }
            b"text:note" if !empty => {
                let source = match attr(e, b"text:note-class")?.as_deref() {
                    Some("endnote") => AnnotationSource::Endnote,
                    _ => AnnotationSource::Footnote,
                };
                let mut capture = Capture::new(source, b"text:note", attr(e, b"text:id")?);
                capture.class_style = Some(match source {
                    AnnotationSource::Endnote => "endnote".to_string(),
                    _ => "footnote".to_string(),
                });
                self.capture = Some(capture);
            }
            _ => {}
        }
        Ok(())
    }

    fn style_start(&mut self, name: &[u8], e: &BytesStart, empty: bool) -> Result<()> {
        match name {
            b"style:style" => {
                let style_name = attr(e, b"style:name")?.unwrap_or_default();
                let family = attr(e, b"style:family")?
                    .map(|f| StyleFamily::from_attr(&f))
                    .unwrap_or(StyleFamily::Other);
                let mut def = StyleDef::new(style_name, family);
                def.parent = attr(e, b"style:parent-style-name")?;
                if empty {
                    self.sheet.define(def);
                } else {
                    self.style_def = Some(def);
                }
            }
            b"style:text-properties" => {
                if let Some(def) = self.style_def.as_mut() {
                    for a in e.attributes() {
                        let a = a.map_err(|err| Error::MalformedSource(err.to_string()))?;
                        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                        let value = a.unescape_value()?;
                        def.apply_text_property(&key, &value);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn capture_start(&mut self, name: &[u8], e: &BytesStart, empty: bool) -> Result<()> {
        let style = match name {
            b"text:p" | b"text:h" => attr(e, b"text:style-name")?,
            _ => None,
        };
        let Some(capture) = self.capture.as_mut() else {
            return Ok(());
        };
        match name {
            b"dc:creator" if !empty => capture.field = Field::Creator,
            b"dc:date" if !empty => capture.field = Field::Date,
            b"text:note-citation" if !empty => capture.field = Field::Citation,
            b"text:p" | b"text:h" => {
                if capture.style.is_none() {
                    capture.style = style;
                }
                if empty {
                    capture.paragraphs.push(String::new());
                } else {
                    capture.current = Some(String::new());
                    capture.last_space = true;
                }
            }
            b"text:s" => {
                let count = space_count(e)?;
                capture.literal(&" ".repeat(count));
            }
            b"text:tab" => capture.literal("\t"),
            b"text:line-break" => capture.literal("\n"),
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        if self.in_styles {
            match name {
                b"style:style" => {
                    if let Some(def) = self.style_def.take() {
                        self.sheet.define(def);
                    }
                }
                b"office:automatic-styles" | b"office:styles" => self.in_styles = false,
                _ => {}
            }
            return;
        }
        if self.in_meta {
            if name == b"office:meta" {
                self.in_meta = false;
            }
            self.meta_field = None;
            return;
        }
        if self.capture.as_ref().map(|c| c.end_tag == name) == Some(true) {
            if let Some(capture) = self.capture.take() {
                self.finish_capture(capture);
            }
            return;
        }
        if let Some(capture) = self.capture.as_mut() {
            match name {
                b"dc:creator" | b"dc:date" | b"text:note-citation" => capture.field = Field::Body,
                b"text:p" | b"text:h" => {
                    if let Some(current) = capture.current.take() {
                        capture.paragraphs.push(current);
                    }
                }
                _ => {}
            }
            return;
        }

        match name {
            b"office:text" => {
                if let Some(open) = self.paragraph.take() {
                    self.push_paragraph(open);
                }
                self.in_text = false;
            }
            b"text:p" | b"text:h" => {
                if let Some(open) = self.paragraph.take() {
                    self.push_paragraph(open);
                }
            }
            b"text:span" => {
                if let Some(p) = self.paragraph.as_mut() {
                    if p.styles.len() > 1 {
                        p.styles.pop();
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let collapse = self.options.collapse_whitespace;
        if self.in_meta {
            let slot = match self.meta_field {
                Some(MetaField::Title) => &mut self.doc.metadata.title,
                Some(MetaField::Creator) => &mut self.doc.metadata.author,
                Some(MetaField::Language) => &mut self.doc.metadata.language,
                None => return,
            };
            slot.get_or_insert_with(String::new).push_str(text);
            return;
        }
        if let Some(capture) = self.capture.as_mut() {
            capture.text(text, collapse);
            return;
        }
        if let Some(p) = self.paragraph.as_mut() {
            p.push_text(text, collapse);
        }
    }

    fn paragraph_builder(&self, name: &[u8], e: &BytesStart) -> Result<ParagraphBuilder> {
        let mut paragraph = Paragraph::new();
        let style_name = attr(e, b"text:style-name")?;
        let base = style_name
            .as_deref()
            .map(|s| self.sheet.text_style(StyleFamily::Paragraph, s))
            .unwrap_or_default();
        paragraph.style.name = style_name;
        if name == b"text:h" {
            let level = attr(e, b"text:outline-level")?
                .and_then(|l| l.parse::<u8>().ok())
                .unwrap_or(1);
            paragraph.style.heading_level = Some(level.clamp(1, 10));
        }
        Ok(ParagraphBuilder::new(paragraph, base))
    }

    fn ensure_paragraph(&mut self) -> &mut ParagraphBuilder {
        self.paragraph
            .get_or_insert_with(|| ParagraphBuilder::new(Paragraph::new(), TextStyle::default()))
    }

    fn push_paragraph(&mut self, builder: ParagraphBuilder) {
        let paragraph = builder.finish(self.options.collapse_whitespace);
        if self.options.skip_empty_paragraphs && paragraph.is_empty() {
            return;
        }
        self.doc.add_paragraph(paragraph);
    }

    fn finish_capture(&mut self, mut capture: Capture) {
        if let Some(current) = capture.current.take() {
            capture.paragraphs.push(current);
        }

        let mut style_chain = capture
            .style
            .as_deref()
            .map(|s| self.sheet.chain(StyleFamily::Paragraph, s))
            .unwrap_or_default();
        if let Some(class) = capture.class_style.take() {
            style_chain.push(class);
        }

        let annotation = RawAnnotation {
            id: AnnotationId(0),
            name: capture.name.clone(),
            style_name: capture.style.clone(),
            style_chain,
            marker: MarkerId(0),
            raw_text: capture.raw_text(),
            source: capture.source,
            author: non_empty(capture.author.trim()),
            date: parse_date(capture.date.trim()),
            citation: non_empty(capture.citation.trim()),
        };

        let marker = self.doc.push_annotation(annotation);
        if capture.source == AnnotationSource::Comment {
            if let Some(name) = capture.name {
                self.open_ranges.insert(name, marker);
            }
        }
        self.ensure_paragraph().paragraph.add_marker(marker);
    }

    fn finish(mut self) -> Result<Document> {
        if !self.seen_root {
            return Err(Error::MalformedSource("no root element".to_string()));
        }
        if !self.seen_text {
            return Err(Error::MalformedSource(
                "document has no office:text body".to_string(),
            ));
        }
        if let Some(open) = self.paragraph.take() {
            self.push_paragraph(open);
        }
        for name in self.open_ranges.keys() {
            log::debug!("annotation {} has no end marker, treated as a point", name);
        }
        log::debug!(
            "parsed {} paragraphs, {} annotations, {} styles",
            self.doc.paragraph_count(),
            self.doc.annotation_count(),
            self.sheet.len()
        );
        Ok(self.doc)
    }
}

/// Value of an attribute, unescaped.
fn attr(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| Error::MalformedSource(err.to_string()))?;
        if a.key.as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Repeat count of a `text:s` element, clamped to [`MAX_SPACES`].
fn space_count(e: &BytesStart) -> Result<usize> {
    let count = attr(e, b"text:c")?
        .and_then(|c| c.trim().parse::<u64>().ok())
        .unwrap_or(1);
    if count > MAX_SPACES as u64 {
        log::warn!("text:s repeat count {} clamped to {}", count, MAX_SPACES);
    }
    Ok(count.min(MAX_SPACES as u64) as usize)
}

/// Collapse runs of XML whitespace to one space, continuing from the
/// previous chunk's state.
fn collapse_whitespace(text: &str, last_space: &mut bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !*last_space {
                out.push(' ');
                *last_space = true;
            }
        } else {
            out.push(c);
            *last_space = false;
        }
    }
    out
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parse a `dc:date` value (`2019-03-04T10:22:31.123456789` or a plain date).
fn parse_date(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0" xmlns:dc="http://purl.org/dc/elements/1.1/""#;

    fn content(styles: &str, body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content {NS}><office:automatic-styles>{styles}</office:automatic-styles><office:body><office:text>{body}</office:text></office:body></office:document-content>"#
        )
    }

    fn parse(xml: &str) -> Document {
        SourceParser::new().parse_str(xml).unwrap()
    }

    // ==================== Paragraph Tests ====================

    #[test]
    fn test_paragraphs_and_headings() {
        let doc = parse(&content(
            "",
            r#"<text:h text:outline-level="2">Kapitola</text:h><text:p text:style-name="Standard">Text</text:p>"#,
        ));
        assert_eq!(doc.paragraphs.len(), 2);
        assert_eq!(doc.paragraphs[0].style.heading_level, Some(2));
        assert_eq!(doc.paragraphs[1].plain_text(), "Text");
        assert_eq!(doc.paragraphs[1].style.name.as_deref(), Some("Standard"));
    }

    #[test]
    fn test_whitespace_collapse() {
        let doc = parse(&content(
            "",
            "<text:p>\n   Jedno    slovo\n a <text:s text:c=\"2\"/>dvě<text:tab/>tři </text:p>",
        ));
        assert_eq!(doc.paragraphs[0].plain_text(), "Jedno slovo a   dvě\ttři");
    }

    #[test]
    fn test_space_count_is_clamped() {
        let doc = parse(&content(
            "",
            "<text:p>a<text:s text:c=\"99999999999\"/>b<text:s text:c=\"x\"/>c</text:p>",
        ));
        let text = doc.paragraphs[0].plain_text();
        assert_eq!(text.len(), 2 + MAX_SPACES + 1 + 1);
        assert!(text.starts_with("a "));
        assert!(text.ends_with("b c"));
    }

    #[test]
    fn test_preserve_whitespace() {
        let parser = SourceParser::with_options(ParseOptions::new().preserve_whitespace());
        let doc = parser
            .parse_str(&content("", "<text:p>a  b</text:p>"))
            .unwrap();
        assert_eq!(doc.paragraphs[0].plain_text(), "a  b");
    }

    #[test]
    fn test_span_styles_and_line_break() {
        let styles = r#"<style:style style:name="T1" style:family="text"><style:text-properties fo:font-style="italic"/></style:style><style:style style:name="T2" style:family="text"><style:text-properties fo:font-weight="bold"/></style:style>"#;
        let doc = parse(&content(
            styles,
            r#"<text:p>a<text:span text:style-name="T1">b<text:span text:style-name="T2">c</text:span></text:span><text:line-break/>d</text:p>"#,
        ));
        let content = &doc.paragraphs[0].content;
        assert_eq!(content.len(), 5);
        match &content[2] {
            InlineContent::Text(run) => {
                assert_eq!(run.text, "c");
                assert!(run.style.italic && run.style.bold);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(content[3], InlineContent::LineBreak);
    }

    #[test]
    fn test_tracked_changes_are_skipped() {
        let doc = parse(&content(
            "",
            r#"<text:tracked-changes><text:changed-region><text:deletion><text:p>gone</text:p></text:deletion></text:changed-region></text:tracked-changes><text:p>kept</text:p>"#,
        ));
        assert_eq!(doc.paragraphs.len(), 1);
        assert_eq!(doc.paragraphs[0].plain_text(), "kept");
    }

    #[test]
    fn test_skip_empty_paragraphs() {
        let xml = content("", "<text:p/><text:p>  </text:p><text:p>x</text:p>");
        assert_eq!(parse(&xml).paragraphs.len(), 3);

        let parser =
            SourceParser::with_options(ParseOptions::new().with_skip_empty_paragraphs(true));
        assert_eq!(parser.parse_str(&xml).unwrap().paragraphs.len(), 1);
    }

    // ==================== Annotation Tests ====================

    #[test]
    fn test_annotation_marker_and_body() {
        let styles = r#"<style:style style:name="P9" style:family="paragraph" style:parent-style-name="Apparatus"/>"#;
        let doc = parse(&content(
            styles,
            r#"<text:p>cnost<office:annotation><dc:creator>TH</dc:creator><dc:date>2019-03-04T10:22:31.5</dc:date><text:p text:style-name="P9">— 5 cnost] cnosti St</text:p></office:annotation> a dále</text:p>"#,
        ));
        assert_eq!(doc.annotations.len(), 1);
        let ann = &doc.annotations[0];
        assert_eq!(ann.id, AnnotationId(1));
        assert_eq!(ann.raw_text, "— 5 cnost] cnosti St");
        assert_eq!(ann.style_chain, vec!["P9".to_string(), "Apparatus".to_string()]);
        assert_eq!(ann.author.as_deref(), Some("TH"));
        assert!(ann.date.is_some());

        let p = &doc.paragraphs[0];
        assert_eq!(p.plain_text(), "cnost a dále");
        assert_eq!(p.content[1], InlineContent::Marker(MarkerId(1)));
    }

    #[test]
    fn test_ranged_annotation() {
        let doc = parse(&content(
            "",
            r#"<text:p>a <office:annotation office:name="__Annotation__1"><text:p text:style-name="Comment">note</text:p></office:annotation>bc d<office:annotation-end office:name="__Annotation__1"/> e</text:p>"#,
        ));
        let p = &doc.paragraphs[0];
        assert!(p.content.contains(&InlineContent::MarkerEnd(MarkerId(1))));
        assert_eq!(doc.annotations[0].name.as_deref(), Some("__Annotation__1"));
    }

    #[test]
    fn test_multi_paragraph_annotation_body() {
        let doc = parse(&content(
            "",
            r#"<text:p>x<office:annotation><text:p text:style-name="Comment">first</text:p><text:p>second</text:p></office:annotation></text:p>"#,
        ));
        assert_eq!(doc.annotations[0].raw_text, "first\nsecond");
    }

    #[test]
    fn test_footnote() {
        let doc = parse(&content(
            "",
            r#"<text:p>slovo<text:note text:id="ftn1" text:note-class="footnote"><text:note-citation>1</text:note-citation><text:note-body><text:p text:style-name="Footnote">poznámka</text:p></text:note-body></text:note> dál</text:p>"#,
        ));
        let ann = &doc.annotations[0];
        assert_eq!(ann.source, AnnotationSource::Footnote);
        assert_eq!(ann.citation.as_deref(), Some("1"));
        assert_eq!(ann.raw_text, "poznámka");
        assert_eq!(ann.style_chain, vec!["Footnote".to_string(), "footnote".to_string()]);
        assert_eq!(doc.paragraphs[0].plain_text(), "slovo dál");
    }

    #[test]
    fn test_dangling_annotation_end_is_ignored() {
        let doc = parse(&content(
            "",
            r#"<text:p>a<office:annotation-end office:name="nope"/></text:p>"#,
        ));
        assert_eq!(doc.paragraphs[0].content.len(), 1);
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_malformed_xml() {
        let result = SourceParser::new().parse_str(&content("", "<text:p>a</text:span>"));
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn test_truncated_document() {
        let xml = format!(
            r#"<office:document-content {NS}><office:body><office:text><text:p>a"#
        );
        let result = SourceParser::new().parse_str(&xml);
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn test_wrong_root() {
        let result = SourceParser::new().parse_str("<html><body/></html>");
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn test_missing_text_body() {
        let xml = format!(
            r#"<office:document-content {NS}><office:body><office:spreadsheet/></office:body></office:document-content>"#
        );
        let result = SourceParser::new().parse_str(&xml);
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn test_flat_document_metadata() {
        let xml = format!(
            r#"<office:document {NS} xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0"><office:meta><dc:title>Labyrint</dc:title><dc:language>cs</dc:language></office:meta><office:body><office:text><text:p>x</text:p></office:text></office:body></office:document>"#
        );
        let doc = parse(&xml);
        assert!(doc.metadata.flat);
        assert_eq!(doc.metadata.title.as_deref(), Some("Labyrint"));
        assert_eq!(doc.metadata.language.as_deref(), Some("cs"));
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2019-03-04T10:22:31").is_some());
        assert!(parse_date("2019-03-04T10:22:31.123456789").is_some());
        assert!(parse_date("2019-03-04").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
