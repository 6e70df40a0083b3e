//! Annotated output tree.
//!
//! The tree is built fresh from the character stream and the placement
//! decisions; the parsed source document is never touched. Placed spans
//! never cross, so every paragraph becomes a proper tree of text, line
//! breaks, milestones and annotation elements.

use crate::annotate::anchor::{AtomKind, Division, StreamParagraph, Wrap};
use crate::annotate::{Milestone, TextStream};
use crate::config::NestingOrder;
use crate::model::{AnnotationId, AnnotationSource, ApparatusEntry, TextStyle};
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::ops::Range;

/// Payload of a placed annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpanBody {
    /// A parsed apparatus entry
    Apparatus { entry: ApparatusEntry },
    /// Comment text (lines separated by `\n`)
    Comment { text: String },
    /// Footnote or endnote text, placed at a point
    Note {
        text: String,
        source: AnnotationSource,
        citation: Option<String>,
    },
}

/// A placed annotation, ready to be woven into the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedSpan {
    pub id: AnnotationId,
    pub paragraph: usize,
    pub range: Range<usize>,
    pub body: SpanBody,
}

/// A node of the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Kept text of one style
    Text { style: TextStyle, text: String },
    /// `<lb/>`
    LineBreak,
    /// `<pb/>`
    Milestone { milestone: Milestone },
    /// `<app>` wrapping its lemma span
    Apparatus {
        id: AnnotationId,
        entry: ApparatusEntry,
        children: Vec<Node>,
    },
    /// `<seg>` wrapping the commented span
    Comment {
        id: AnnotationId,
        text: String,
        children: Vec<Node>,
    },
    /// `<note>` standing at its marker
    Note {
        id: AnnotationId,
        text: String,
        source: AnnotationSource,
        citation: Option<String>,
    },
    /// Element from a wrap rule (`<foreign>`, `<add>`, `<hi>`)
    Wrap { wrap: Wrap, children: Vec<Node> },
}

impl Node {
    /// Flattened text of the node, as shown in a comment label.
    pub fn label_text(&self) -> String {
        match self {
            Node::Text { text, .. } => text.clone(),
            Node::LineBreak => " ".to_string(),
            Node::Milestone { .. } | Node::Note { .. } => String::new(),
            Node::Apparatus { children, .. }
            | Node::Comment { children, .. }
            | Node::Wrap { children, .. } => children.iter().map(Node::label_text).collect(),
        }
    }
}

/// A paragraph or heading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Outline level for headings
    pub heading_level: Option<u8>,
    /// Division opened before this block
    pub division: Option<Division>,
    pub nodes: Vec<Node>,
}

/// The whole annotated body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedTree {
    pub blocks: Vec<Block>,
}

impl AnnotatedTree {
    /// Build the tree. `spans` must not cross within a paragraph.
    ///
    /// Empty spans (notes) come before the spans starting at the same
    /// position, so they never end up inside them.
    pub fn build(stream: &TextStream, mut spans: Vec<PlacedSpan>, nesting: NestingOrder) -> Self {
        spans.sort_by(|a, b| {
            a.paragraph
                .cmp(&b.paragraph)
                .then(a.range.start.cmp(&b.range.start))
                .then(b.range.is_empty().cmp(&a.range.is_empty()))
                .then(b.range.end.cmp(&a.range.end))
                .then(match nesting {
                    NestingOrder::EarlierOuter => a.id.cmp(&b.id),
                    NestingOrder::LaterOuter => b.id.cmp(&a.id),
                })
        });
        let mut spans = spans.into_iter().peekable();

        let blocks = stream
            .paragraphs
            .iter()
            .enumerate()
            .map(|(index, paragraph)| {
                let mut own = Vec::new();
                while let Some(span) = spans.next_if(|s| s.paragraph == index) {
                    own.push(span);
                }
                let mut own = own.into_iter().peekable();
                let mut nodes = build_nodes(paragraph, 0..paragraph.atoms.len(), &mut own);
                // Notes at the very end of the paragraph
                nodes.extend(own.map(|span| node(span, Vec::new())));

                let heading = paragraph.division.as_ref().map(|d| d.heading).unwrap_or(false);
                Block {
                    heading_level: paragraph
                        .style
                        .heading_level
                        .or(heading.then_some(1)),
                    division: paragraph.division.clone(),
                    nodes,
                }
            })
            .collect();

        Self { blocks }
    }

    /// Ids of every annotation element, in document order (with repeats).
    pub fn annotation_ids(&self) -> Vec<AnnotationId> {
        fn walk(nodes: &[Node], out: &mut Vec<AnnotationId>) {
            for node in nodes {
                match node {
                    Node::Apparatus { id, children, .. } | Node::Comment { id, children, .. } => {
                        out.push(*id);
                        walk(children, out);
                    }
                    Node::Note { id, .. } => out.push(*id),
                    Node::Wrap { children, .. } => walk(children, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        for block in &self.blocks {
            walk(&block.nodes, &mut out);
        }
        out
    }
}

fn build_nodes<I>(paragraph: &StreamParagraph, range: Range<usize>, spans: &mut Peekable<I>) -> Vec<Node>
where
    I: Iterator<Item = PlacedSpan>,
{
    let mut nodes = Vec::new();
    let mut pos = range.start;

    while let Some(span) = spans.next_if(|s| s.range.start < range.end) {
        emit_atoms(paragraph, pos..span.range.start, &mut nodes);
        let children = build_nodes(paragraph, span.range.clone(), spans);
        pos = span.range.end;
        nodes.push(node(span, children));
    }
    emit_atoms(paragraph, pos..range.end, &mut nodes);
    nodes
}

fn node(span: PlacedSpan, children: Vec<Node>) -> Node {
    match span.body {
        SpanBody::Apparatus { entry } => Node::Apparatus {
            id: span.id,
            entry,
            children,
        },
        SpanBody::Comment { text } => Node::Comment {
            id: span.id,
            text,
            children,
        },
        SpanBody::Note {
            text,
            source,
            citation,
        } => Node::Note {
            id: span.id,
            text,
            source,
            citation,
        },
    }
}

/// Emit the atoms of `range` as leaves, opening and closing wrap elements
/// as the set of wraps covering each kept atom changes.
fn emit_atoms(paragraph: &StreamParagraph, range: Range<usize>, nodes: &mut Vec<Node>) {
    let mut open: Vec<(usize, Vec<Node>)> = Vec::new();

    for i in range {
        for (_, milestone) in paragraph.milestones.iter().filter(|(at, _)| *at == i) {
            current(nodes, &mut open).push(Node::Milestone {
                milestone: milestone.clone(),
            });
        }
        let Some(atom) = paragraph.atoms.get(i) else {
            continue;
        };
        if !atom.kept {
            continue;
        }

        let active = paragraph.wraps_at(i);
        let shared = open
            .iter()
            .zip(&active)
            .take_while(|((w, _), a)| w == *a)
            .count();
        while open.len() > shared {
            close(paragraph, nodes, &mut open);
        }
        open.extend(active[shared..].iter().map(|w| (*w, Vec::new())));

        let target = current(nodes, &mut open);
        match atom.kind {
            AtomKind::LineBreak => target.push(Node::LineBreak),
            AtomKind::Char => match target.last_mut() {
                Some(Node::Text { style, text }) if *style == atom.style => text.push(atom.ch),
                _ => target.push(Node::Text {
                    style: atom.style,
                    text: atom.ch.to_string(),
                }),
            },
        }
    }
    while !open.is_empty() {
        close(paragraph, nodes, &mut open);
    }
}

fn current<'a>(nodes: &'a mut Vec<Node>, open: &'a mut [(usize, Vec<Node>)]) -> &'a mut Vec<Node> {
    match open.last_mut() {
        Some((_, children)) => children,
        None => nodes,
    }
}

fn close(paragraph: &StreamParagraph, nodes: &mut Vec<Node>, open: &mut Vec<(usize, Vec<Node>)>) {
    if let Some((w, children)) = open.pop() {
        let wrap = paragraph.wraps[w].1.clone();
        current(nodes, open).push(Node::Wrap { wrap, children });
    }
}
