//! TEI P5 serialization.
//!
//! Output is deterministic: the same tree, metadata and options always give
//! byte-identical XML. Block-level elements are indented; inline content is
//! written exactly as the tree holds it.

use super::options::RenderOptions;
use super::tree::{AnnotatedTree, Block, Node};
use crate::annotate::anchor::{Division, Wrap};
use crate::error::{Error, Result};
use crate::model::{AnnotationId, AnnotationSource, ApparatusEntry, Metadata, Reading};
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

/// TEI namespace.
pub const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";

const FALLBACK_TITLE: &str = "Untitled";

/// Writes an [`AnnotatedTree`] as a TEI document.
#[derive(Debug, Clone)]
pub struct TeiSerializer<'a> {
    options: &'a RenderOptions,
    witnesses: Vec<String>,
}

impl<'a> TeiSerializer<'a> {
    /// Create a serializer.
    pub fn new(options: &'a RenderOptions) -> Self {
        Self {
            options,
            witnesses: Vec::new(),
        }
    }

    /// Witness ids listed in `sourceDesc/listWit`.
    pub fn with_witnesses(mut self, witnesses: Vec<String>) -> Self {
        self.witnesses = witnesses;
        self
    }

    /// Serialize the tree.
    ///
    /// Every id in `placed` must appear exactly once in the tree.
    pub fn serialize(
        &self,
        tree: &AnnotatedTree,
        metadata: &Metadata,
        placed: &[AnnotationId],
    ) -> Result<String> {
        let mut out = Output::new(self.options);

        out.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        if let Some(href) = &self.options.stylesheet {
            out.raw(&format!(
                "\n<?xml-stylesheet type=\"text/xsl\" href=\"{}\"?>",
                escape(href.as_str())
            ));
        }

        out.raw("\n");
        let mut root = vec![("xmlns", TEI_NS.to_string())];
        if let Some(lang) = self.options.language.as_ref().or(metadata.language.as_ref()) {
            root.push(("xml:lang", lang.clone()));
        }
        out.start("TEI", &root)?;
        self.write_header(&mut out, metadata)?;

        out.block_start("text", &[])?;
        out.block_start("body", &[])?;
        let mut in_div = false;
        for block in &tree.blocks {
            match &block.division {
                Some(division) => {
                    if in_div {
                        out.block_end()?;
                    }
                    out.block_start("div", &division_attrs(division))?;
                    in_div = true;
                    // A paragraph holding nothing but the division tag
                    if block.nodes.is_empty() {
                        continue;
                    }
                }
                None if !in_div => {
                    out.block_start("div", &[])?;
                    in_div = true;
                }
                None => {}
            }
            write_block(&mut out, block)?;
        }
        if !in_div {
            out.block_start("div", &[])?;
        }
        out.block_end()?;
        out.block_end()?;
        out.block_end()?;
        out.block_end()?;
        out.raw("\n");

        out.finish(placed)
    }

    fn write_header(&self, out: &mut Output<'_>, metadata: &Metadata) -> Result<()> {
        let title = self
            .options
            .title
            .as_deref()
            .or(metadata.title.as_deref())
            .unwrap_or(FALLBACK_TITLE);

        out.block_start("teiHeader", &[])?;
        out.block_start("fileDesc", &[])?;

        out.block_start("titleStmt", &[])?;
        out.block_text_element("title", title)?;
        if let Some(author) = &metadata.author {
            out.block_text_element("author", author)?;
        }
        out.block_end()?;

        out.block_start("publicationStmt", &[])?;
        out.block_text_element("p", "Converted from an OpenDocument manuscript.")?;
        out.block_end()?;

        out.block_start("sourceDesc", &[])?;
        if self.witnesses.is_empty() {
            out.block_text_element("p", "No witnesses configured.")?;
        } else {
            out.block_start("listWit", &[])?;
            for witness in &self.witnesses {
                out.newline();
                out.start("witness", &[("xml:id", witness.clone())])?;
                out.text(witness)?;
                out.end()?;
            }
            out.block_end()?;
        }
        out.block_end()?;

        out.block_end()?;
        out.block_end()
    }
}

/// Serialize a tree with the given options and witnesses.
pub fn to_tei(
    tree: &AnnotatedTree,
    metadata: &Metadata,
    witnesses: Vec<String>,
    placed: &[AnnotationId],
    options: &RenderOptions,
) -> Result<String> {
    TeiSerializer::new(options)
        .with_witnesses(witnesses)
        .serialize(tree, metadata, placed)
}

/// A detached `app` element for an entry that could not be placed.
///
/// The lemma is written from the entry itself since there is no span.
pub fn apparatus_fragment(id: AnnotationId, entry: &ApparatusEntry) -> Result<String> {
    let options = RenderOptions::default().with_indent(false);
    let mut out = Output::new(&options);
    let lemma = vec![Node::Text {
        style: Default::default(),
        text: entry.lemma.clone(),
    }];
    write_apparatus(&mut out, id, entry, &lemma)?;
    out.finish(&[id])
}

fn division_attrs(division: &Division) -> Vec<(&'static str, String)> {
    let mut attrs = Vec::new();
    if let Some(kind) = &division.kind {
        attrs.push(("type", kind.clone()));
    }
    if let Some(lang) = &division.language {
        attrs.push(("xml:lang", lang.clone()));
    }
    attrs
}

fn write_block(out: &mut Output<'_>, block: &Block) -> Result<()> {
    out.newline();
    match block.heading_level {
        Some(level) if level > 1 => {
            out.start("head", &[("n", level.to_string())])?;
        }
        Some(_) => out.start("head", &[])?,
        None => out.start("p", &[])?,
    }
    write_nodes(out, &block.nodes)?;
    out.end()
}

fn write_nodes(out: &mut Output<'_>, nodes: &[Node]) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text { style, text } => {
                if style.has_styling() {
                    out.start("hi", &[("rend", style.rend())])?;
                    out.text(text)?;
                    out.end()?;
                } else {
                    out.text(text)?;
                }
            }
            Node::LineBreak => out.empty("lb", &[])?,
            Node::Milestone { milestone } => {
                let mut attrs = Vec::new();
                if let Some(n) = &milestone.n {
                    attrs.push(("n", n.clone()));
                }
                if let Some(ed) = &milestone.edition {
                    attrs.push(("ed", ed.clone()));
                }
                if milestone.inside_word {
                    attrs.push(("break", "no".to_string()));
                }
                out.empty("pb", &attrs)?;
            }
            Node::Apparatus {
                id,
                entry,
                children,
            } => write_apparatus(out, *id, entry, children)?,
            Node::Comment { id, text, children } => write_comment(out, *id, text, children)?,
            Node::Note {
                id,
                text,
                source,
                citation,
            } => write_note(out, *id, text, *source, citation.as_deref())?,
            Node::Wrap { wrap, children } => write_wrap(out, wrap, children)?,
        }
    }
    Ok(())
}

fn wit(sigla: &[String]) -> String {
    sigla
        .iter()
        .map(|s| format!("#{}", s))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_apparatus(
    out: &mut Output<'_>,
    id: AnnotationId,
    entry: &ApparatusEntry,
    lemma: &[Node],
) -> Result<()> {
    out.mark(id);
    let xml_id = format!("{}{}", out.options.apparatus_id_prefix, id);
    out.start("app", &[("xml:id", xml_id)])?;

    let lem_attrs = if entry.lemma_sigla.is_empty() {
        Vec::new()
    } else {
        vec![("wit", wit(&entry.lemma_sigla))]
    };
    out.start("lem", &lem_attrs)?;
    write_nodes(out, lemma)?;
    out.end()?;

    for reading in &entry.readings {
        write_reading(out, reading)?;
    }
    if let Some(note) = &entry.note {
        out.start("note", &[])?;
        out.text(note)?;
        out.end()?;
    }
    out.end()
}

fn write_reading(out: &mut Output<'_>, reading: &Reading) -> Result<()> {
    let mut attrs = vec![("wit", wit(&reading.sigla))];
    if reading.omission {
        attrs.push(("type", "omission".to_string()));
        return out.empty("rdg", &attrs);
    }
    out.start("rdg", &attrs)?;
    out.text(&reading.text)?;
    out.end()
}

fn write_comment(out: &mut Output<'_>, id: AnnotationId, text: &str, children: &[Node]) -> Result<()> {
    out.mark(id);
    let xml_id = format!("{}{}", out.options.comment_id_prefix, id);

    out.start("seg", &[("xml:id", xml_id.clone()), ("type", "comment".to_string())])?;
    write_nodes(out, children)?;
    out.end()?;

    out.start(
        "note",
        &[
            ("xml:id", format!("{}-note", xml_id)),
            ("type", "gloss".to_string()),
            ("place", "bottom".to_string()),
            ("target", format!("#{}", xml_id)),
        ],
    )?;
    let label: String = children.iter().map(Node::label_text).collect();
    out.start("label", &[])?;
    out.text(label.trim())?;
    out.end()?;
    write_lines(out, text)?;
    out.end()
}

fn write_note(
    out: &mut Output<'_>,
    id: AnnotationId,
    text: &str,
    source: AnnotationSource,
    citation: Option<&str>,
) -> Result<()> {
    out.mark(id);
    let (kind, place) = match source {
        AnnotationSource::Endnote => ("endnote", "end"),
        AnnotationSource::Footnote => ("footnote", "foot"),
        AnnotationSource::Comment => ("gloss", "bottom"),
    };
    let mut attrs = vec![
        ("xml:id", format!("{}{}", out.options.comment_id_prefix, id)),
        ("type", kind.to_string()),
        ("place", place.to_string()),
    ];
    if let Some(n) = citation {
        attrs.push(("n", n.to_string()));
    }
    out.start("note", &attrs)?;
    write_lines(out, text)?;
    out.end()
}

fn write_wrap(out: &mut Output<'_>, wrap: &Wrap, children: &[Node]) -> Result<()> {
    let attrs: Vec<(&str, String)> = wrap
        .attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();
    out.start(&wrap.element, &attrs)?;
    write_nodes(out, children)?;
    out.end()
}

/// Text with `lb` between its lines.
fn write_lines(out: &mut Output<'_>, text: &str) -> Result<()> {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.empty("lb", &[])?;
        }
        out.text(line)?;
    }
    Ok(())
}

/// Writer state: the XML writer, the open-element stack and the ids seen.
struct Output<'a> {
    writer: Writer<Vec<u8>>,
    options: &'a RenderOptions,
    stack: Vec<String>,
    emitted: BTreeMap<AnnotationId, usize>,
}

impl<'a> Output<'a> {
    fn new(options: &'a RenderOptions) -> Self {
        Self {
            writer: Writer::new(Vec::new()),
            options,
            stack: Vec::new(),
            emitted: BTreeMap::new(),
        }
    }

    fn normalized(&self, text: &str) -> String {
        if self.options.normalize_unicode {
            text.nfc().collect()
        } else {
            text.to_string()
        }
    }

    fn raw(&mut self, text: &str) {
        self.writer.get_mut().extend_from_slice(text.as_bytes());
    }

    fn newline(&mut self) {
        if self.options.indent {
            let pad = format!("\n{}", "  ".repeat(self.stack.len()));
            self.raw(&pad);
        }
    }

    fn element(&self, name: &str, attrs: &[(&str, String)]) -> BytesStart<'static> {
        let mut element = BytesStart::new(name.to_string());
        for (key, value) in attrs {
            element.push_attribute((*key, self.normalized(value).as_str()));
        }
        element
    }

    fn start(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<()> {
        let element = self.element(name, attrs);
        self.writer.write_event(Event::Start(element))?;
        self.stack.push(name.to_string());
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<()> {
        let element = self.element(name, attrs);
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let name = self
            .stack
            .pop()
            .ok_or_else(|| Error::Serialization("closing an element that is not open".into()))?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let text = self.normalized(text);
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(partial_escape(text.as_str()))))?;
        Ok(())
    }

    fn block_start(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<()> {
        self.newline();
        self.start(name, attrs)
    }

    fn block_end(&mut self) -> Result<()> {
        if !self.stack.is_empty() {
            let pad = self.stack.len() - 1;
            if self.options.indent {
                self.raw(&format!("\n{}", "  ".repeat(pad)));
            }
        }
        self.end()
    }

    fn block_text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.newline();
        self.start(name, &[])?;
        self.text(text)?;
        self.end()
    }

    fn mark(&mut self, id: AnnotationId) {
        *self.emitted.entry(id).or_default() += 1;
    }

    /// Check the invariants and hand out the XML.
    fn finish(self, placed: &[AnnotationId]) -> Result<String> {
        if let Some(open) = self.stack.last() {
            return Err(Error::Serialization(format!("element <{}> left unclosed", open)));
        }
        for id in placed {
            match self.emitted.get(id).copied().unwrap_or(0) {
                1 => {}
                0 => {
                    return Err(Error::Serialization(format!(
                        "placed annotation {} missing from output",
                        id
                    )))
                }
                n => {
                    return Err(Error::Serialization(format!(
                        "annotation {} written {} times",
                        id, n
                    )))
                }
            }
        }
        if let Some(extra) = self.emitted.keys().find(|id| !placed.contains(*id)) {
            return Err(Error::Serialization(format!(
                "annotation {} written without being placed",
                extra
            )));
        }
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| Error::Serialization(format!("output is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{build_index, Milestone};
    use crate::config::NestingOrder;
    use crate::model::{Document, Paragraph, TextRun, TextStyle};
    use crate::render::tree::{PlacedSpan, SpanBody};

    fn entry() -> ApparatusEntry {
        ApparatusEntry {
            number: Some(12),
            lemma: "cnost".into(),
            lemma_sigla: vec!["A".into()],
            sigla: ["A", "B", "W"].iter().map(|s| s.to_string()).collect(),
            readings: vec![
                Reading::new("ctnost", vec!["W".into()]),
                Reading::omission(vec!["B".into()]),
            ],
            note: Some("srov. v. 14".into()),
        }
    }

    fn tree_for(text: &str, spans: Vec<PlacedSpan>) -> AnnotatedTree {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text(text));
        let (stream, _) = build_index(&doc);
        AnnotatedTree::build(&stream, spans, NestingOrder::EarlierOuter)
    }

    #[test]
    fn test_document_skeleton() {
        let tree = tree_for("Labyrint světa", Vec::new());
        let options = RenderOptions::default().with_title("Labyrint").with_language("cs");
        let xml = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &options).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<TEI"));
        assert!(xml.contains("<TEI xmlns=\"http://www.tei-c.org/ns/1.0\" xml:lang=\"cs\">"));
        assert!(xml.contains("<title>Labyrint</title>"));
        assert!(xml.contains("\n        <p>Labyrint světa</p>"));
        assert!(xml.ends_with("</TEI>\n"));
    }

    #[test]
    fn test_apparatus_element() {
        let tree = tree_for(
            "jeho cnost veliká",
            vec![PlacedSpan {
                id: AnnotationId(1),
                paragraph: 0,
                range: 5..10,
                body: SpanBody::Apparatus { entry: entry() },
            }],
        );
        let xml = to_tei(
            &tree,
            &Metadata::default(),
            vec!["A".into(), "B".into(), "W".into()],
            &[AnnotationId(1)],
            &RenderOptions::default(),
        )
        .unwrap();

        assert!(xml.contains(
            "<p>jeho <app xml:id=\"app1\"><lem wit=\"#A\">cnost</lem>\
             <rdg wit=\"#W\">ctnost</rdg><rdg wit=\"#B\" type=\"omission\"/>\
             <note>srov. v. 14</note></app> veliká</p>"
        ));
        assert!(xml.contains("<witness xml:id=\"W\">W</witness>"));
    }

    #[test]
    fn test_comment_element() {
        let tree = tree_for(
            "Labyrint světa",
            vec![PlacedSpan {
                id: AnnotationId(3),
                paragraph: 0,
                range: 9..14,
                body: SpanBody::Comment {
                    text: "first line\nsecond & last".into(),
                },
            }],
        );
        let xml = to_tei(
            &tree,
            &Metadata::default(),
            Vec::new(),
            &[AnnotationId(3)],
            &RenderOptions::default(),
        )
        .unwrap();

        assert!(xml.contains(
            "<seg xml:id=\"c3\" type=\"comment\">světa</seg>\
             <note xml:id=\"c3-note\" type=\"gloss\" place=\"bottom\" target=\"#c3\">\
             <label>světa</label>first line<lb/>second &amp; last</note>"
        ));
    }

    #[test]
    fn test_inline_markup() {
        let mut doc = Document::new();
        let mut p = Paragraph::with_text("a ");
        p.add_run(TextRun::styled(
            "b",
            TextStyle {
                bold: true,
                italic: true,
                ..Default::default()
            },
        ));
        p.add_line_break();
        p.add_text("c");
        doc.add_paragraph(p);
        let (mut stream, _) = build_index(&doc);
        stream.paragraphs[0].milestones.push((
            4,
            Milestone {
                n: Some("7".into()),
                edition: Some("DJAK".into()),
                inside_word: false,
            },
        ));
        let tree = AnnotatedTree::build(&stream, Vec::new(), NestingOrder::EarlierOuter);
        let xml = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &RenderOptions::default())
            .unwrap();
        assert!(xml.contains("<p>a <hi rend=\"bold italic\">b</hi><lb/><pb n=\"7\" ed=\"DJAK\"/>c</p>"));
    }

    #[test]
    fn test_notes_wraps_and_word_breaks() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("dixit verbum"));
        let (mut stream, _) = build_index(&doc);
        let p = &mut stream.paragraphs[0];
        p.wraps.push((
            6..12,
            Wrap {
                element: "foreign".into(),
                attributes: vec![("xml:lang".into(), "la".into())],
            },
        ));
        p.milestones.push((
            9,
            Milestone {
                n: None,
                edition: None,
                inside_word: true,
            },
        ));
        let note = PlacedSpan {
            id: AnnotationId(2),
            paragraph: 0,
            range: 5..5,
            body: SpanBody::Note {
                text: "Srov. Mt 5\n& dále".into(),
                source: AnnotationSource::Footnote,
                citation: Some("1".into()),
            },
        };
        let tree = AnnotatedTree::build(&stream, vec![note], NestingOrder::EarlierOuter);
        let xml = to_tei(
            &tree,
            &Metadata::default(),
            Vec::new(),
            &[AnnotationId(2)],
            &RenderOptions::default(),
        )
        .unwrap();

        assert!(xml.contains(
            "<p>dixit<note xml:id=\"c2\" type=\"footnote\" place=\"foot\" n=\"1\">\
             Srov. Mt 5<lb/>&amp; dále</note> \
             <foreign xml:lang=\"la\">ver<pb break=\"no\"/>bum</foreign></p>"
        ));
    }

    #[test]
    fn test_divisions() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("úvod"));
        doc.add_paragraph(Paragraph::with_text("Kapitola"));
        doc.add_paragraph(Paragraph::with_text("text"));
        doc.add_paragraph(Paragraph::new());
        let (mut stream, _) = build_index(&doc);
        stream.paragraphs[1].division = Some(Division {
            kind: Some("chapter".into()),
            heading: true,
            language: None,
        });
        stream.paragraphs[3].division = Some(Division {
            kind: Some("preface".into()),
            heading: false,
            language: Some("la".into()),
        });
        let tree = AnnotatedTree::build(&stream, Vec::new(), NestingOrder::EarlierOuter);
        let xml = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &RenderOptions::default())
            .unwrap();

        assert!(xml.contains("<div>\n        <p>úvod</p>\n      </div>"));
        assert!(xml.contains(
            "<div type=\"chapter\">\n        <head>Kapitola</head>\n        <p>text</p>\n      </div>"
        ));
        assert!(xml.contains("<div type=\"preface\" xml:lang=\"la\">\n      </div>"));
        assert_eq!(xml.matches("<div").count(), 3);
    }

    #[test]
    fn test_nfc_output() {
        let tree = tree_for("sve\u{30c}ta", Vec::new());
        let xml = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &RenderOptions::default())
            .unwrap();
        assert!(xml.contains("<p>světa</p>"));

        let options = RenderOptions::default().with_normalize_unicode(false);
        let xml = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &options).unwrap();
        assert!(xml.contains("sve\u{30c}ta"));
    }

    #[test]
    fn test_stylesheet_and_headings() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::heading("Kapitola", 2));
        let (stream, _) = build_index(&doc);
        let tree = AnnotatedTree::build(&stream, Vec::new(), NestingOrder::EarlierOuter);
        let options = RenderOptions::default().with_stylesheet("tei.xsl");
        let xml = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &options).unwrap();
        assert!(xml.contains("<?xml-stylesheet type=\"text/xsl\" href=\"tei.xsl\"?>"));
        assert!(xml.contains("<head n=\"2\">Kapitola</head>"));
    }

    #[test]
    fn test_missing_placed_annotation_fails() {
        let tree = tree_for("text", Vec::new());
        let err = to_tei(
            &tree,
            &Metadata::default(),
            Vec::new(),
            &[AnnotationId(9)],
            &RenderOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Serialization(ref m) if m.contains('9')));
    }

    #[test]
    fn test_deterministic() {
        let tree = tree_for("Labyrint světa", Vec::new());
        let a = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &RenderOptions::default()).unwrap();
        let b = to_tei(&tree, &Metadata::default(), Vec::new(), &[], &RenderOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_apparatus_fragment() {
        let fragment = apparatus_fragment(AnnotationId(4), &entry()).unwrap();
        assert!(fragment.starts_with("<app xml:id=\"app4\"><lem wit=\"#A\">cnost</lem>"));
        assert!(fragment.ends_with("</app>"));
    }
}
