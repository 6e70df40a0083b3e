//! Character stream and marker offsets.
//!
//! The document is flattened into one stream of [`Atom`]s per paragraph.
//! Markers are recorded as offsets into that stream; normalization later
//! flags atoms as removed without moving anything, so offsets stay valid
//! for the whole conversion.

use crate::config::UnitRule;
use crate::error::Result;
use crate::model::{Document, InlineContent, MarkerId, ParagraphStyle, TextStyle};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// What an atom stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomKind {
    /// A character of text
    Char,
    /// A line break (occupies one position)
    LineBreak,
}

/// One addressable position of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
    /// The character (`\n` for line breaks)
    pub ch: char,
    /// Character style of the run the atom came from
    pub style: TextStyle,
    /// Character or line break
    pub kind: AtomKind,
    /// False once a normalization rule removed the atom from the output
    pub kept: bool,
}

/// A page-break milestone produced by normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Page number (`pb/@n`)
    pub n: Option<String>,
    /// Edition (`pb/@ed`)
    pub edition: Option<String>,
    /// The break falls inside a word (`pb/@break="no"`)
    #[serde(default)]
    pub inside_word: bool,
}

/// An element wrapping part of a paragraph, produced by normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrap {
    /// Element name
    pub element: String,
    /// Attributes in name order
    pub attributes: Vec<(String, String)>,
}

/// Start of a text division.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    /// `div/@type`
    pub kind: Option<String>,
    /// The opening paragraph is the division heading
    pub heading: bool,
    /// `div/@xml:lang`
    pub language: Option<String>,
}

/// One paragraph of the stream.
#[derive(Debug, Clone, Default)]
pub struct StreamParagraph {
    /// Paragraph style copied from the document
    pub style: ParagraphStyle,
    /// Atoms in order
    pub atoms: Vec<Atom>,
    /// Milestones, keyed by the atom they precede
    pub milestones: Vec<(usize, Milestone)>,
    /// Wrapped atom ranges, sorted by start, longest first
    pub wraps: Vec<(Range<usize>, Wrap)>,
    /// Division opened by this paragraph
    pub division: Option<Division>,
}

impl StreamParagraph {
    /// Text of the paragraph including removed atoms.
    pub fn raw_text(&self) -> String {
        self.atoms.iter().map(|a| a.ch).collect()
    }

    /// Text of an atom range, removed atoms left out.
    pub fn kept_text(&self, range: Range<usize>) -> String {
        self.atoms[range]
            .iter()
            .filter(|a| a.kept)
            .map(|a| a.ch)
            .collect()
    }

    /// Check if every atom was removed.
    pub fn is_blank(&self) -> bool {
        self.atoms.iter().all(|a| !a.kept)
    }

    /// Indices into `wraps` of the wraps covering atom `i`, outermost first.
    pub fn wraps_at(&self, i: usize) -> Vec<usize> {
        self.wraps
            .iter()
            .enumerate()
            .filter(|(_, (range, _))| range.contains(&i))
            .map(|(w, _)| w)
            .collect()
    }

    /// Shrink a range until it starts and ends on kept atoms.
    pub fn trim_to_kept(&self, range: Range<usize>) -> Option<Range<usize>> {
        let mut start = range.start;
        let mut end = range.end.min(self.atoms.len());
        while start < end && !self.atoms[start].kept {
            start += 1;
        }
        while end > start && !self.atoms[end - 1].kept {
            end -= 1;
        }
        (start < end).then_some(start..end)
    }
}

/// The flattened document.
#[derive(Debug, Clone, Default)]
pub struct TextStream {
    /// Paragraphs in document order
    pub paragraphs: Vec<StreamParagraph>,
}

impl TextStream {
    /// Number of atoms removed by normalization.
    pub fn removed_count(&self) -> usize {
        self.paragraphs
            .iter()
            .flat_map(|p| p.atoms.iter())
            .filter(|a| !a.kept)
            .count()
    }
}

/// Position of a marker in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorOffset {
    /// Paragraph index
    pub paragraph: usize,
    /// Character offset within the paragraph
    pub offset: usize,
}

impl fmt::Display for AnchorOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}:{}", self.paragraph + 1, self.offset)
    }
}

/// Marker offsets of a document.
#[derive(Debug, Clone, Default)]
pub struct AnchorIndex {
    starts: HashMap<MarkerId, AnchorOffset>,
    ends: HashMap<MarkerId, AnchorOffset>,
}

impl AnchorIndex {
    /// Offset of a marker.
    pub fn offset(&self, marker: MarkerId) -> Option<AnchorOffset> {
        self.starts.get(&marker).copied()
    }

    /// Offset of the end of a ranged marker.
    pub fn end_offset(&self, marker: MarkerId) -> Option<AnchorOffset> {
        self.ends.get(&marker).copied()
    }

    /// Number of indexed markers.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Check if no markers are indexed.
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

/// Flatten a document into its stream and record every marker offset.
pub fn build_index(doc: &Document) -> (TextStream, AnchorIndex) {
    let mut stream = TextStream::default();
    let mut index = AnchorIndex::default();

    for (p_idx, paragraph) in doc.paragraphs.iter().enumerate() {
        let mut sp = StreamParagraph {
            style: paragraph.style.clone(),
            ..Default::default()
        };
        for item in &paragraph.content {
            let here = AnchorOffset {
                paragraph: p_idx,
                offset: sp.atoms.len(),
            };
            match item {
                InlineContent::Text(run) => {
                    sp.atoms.extend(run.text.chars().map(|ch| Atom {
                        ch,
                        style: run.style,
                        kind: AtomKind::Char,
                        kept: true,
                    }));
                }
                InlineContent::LineBreak => sp.atoms.push(Atom {
                    ch: '\n',
                    style: TextStyle::default(),
                    kind: AtomKind::LineBreak,
                    kept: true,
                }),
                InlineContent::Marker(id) => {
                    if index.starts.insert(*id, here).is_some() {
                        log::warn!("marker {} appears more than once", id);
                    }
                }
                InlineContent::MarkerEnd(id) => {
                    index.ends.insert(*id, here);
                }
            }
        }
        stream.paragraphs.push(sp);
    }

    log::debug!(
        "indexed {} markers over {} paragraphs",
        index.len(),
        stream.paragraphs.len()
    );
    (stream, index)
}

/// Cuts paragraphs into lexical units.
#[derive(Debug, Clone)]
pub enum UnitSplitter {
    /// Alphanumeric words
    Word,
    /// Non-whitespace runs
    Whitespace,
    /// Regex matches
    Pattern(Regex),
}

impl UnitSplitter {
    /// Build a splitter for a configured rule.
    pub fn new(rule: &UnitRule) -> Result<Self> {
        Ok(match rule {
            UnitRule::Word => UnitSplitter::Word,
            UnitRule::Whitespace => UnitSplitter::Whitespace,
            UnitRule::Pattern(p) => UnitSplitter::Pattern(Regex::new(p)?),
        })
    }

    /// Units of a character sequence as index ranges, in order.
    pub fn units(&self, chars: &[char]) -> Vec<Range<usize>> {
        match self {
            UnitSplitter::Word => word_units(chars),
            UnitSplitter::Whitespace => runs(chars, |c| !c.is_whitespace()),
            UnitSplitter::Pattern(re) => {
                let text: String = chars.iter().collect();
                let starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
                let to_char = |byte: usize| starts.partition_point(|&b| b < byte);
                re.find_iter(&text)
                    .filter(|m| !m.is_empty())
                    .map(|m| to_char(m.start())..to_char(m.end()))
                    .collect()
            }
        }
    }

    /// Units of a string.
    pub fn units_of(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.units(&chars)
            .into_iter()
            .map(|r| chars[r].iter().collect())
            .collect()
    }

    /// Units of a stream paragraph, computed over all atoms.
    pub fn paragraph_units(&self, paragraph: &StreamParagraph) -> Vec<Range<usize>> {
        let chars: Vec<char> = paragraph.atoms.iter().map(|a| a.ch).collect();
        self.units(&chars)
    }

    /// Units of the kept text of a stream paragraph, as atom ranges.
    ///
    /// Removed atoms are skipped before splitting, so a unit may span a
    /// removed run (`svě<PE_3>ta` is one word). Every returned range starts
    /// and ends on a kept atom.
    pub fn kept_units(&self, paragraph: &StreamParagraph) -> Vec<Range<usize>> {
        let (positions, chars): (Vec<usize>, Vec<char>) = paragraph
            .atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.kept)
            .map(|(i, a)| (i, a.ch))
            .unzip();
        self.units(&chars)
            .into_iter()
            .map(|r| positions[r.start]..positions[r.end - 1] + 1)
            .collect()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || unicode_normalization::char::is_combining_mark(c)
}

/// Characters that join two word characters into one unit.
fn is_word_joiner(c: char) -> bool {
    matches!(c, '\'' | '’' | '\u{AD}' | '-' | '‐')
}

fn word_units(chars: &[char]) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !is_word_char(chars[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() {
            if is_word_char(chars[i]) {
                i += 1;
            } else if is_word_joiner(chars[i])
                && chars.get(i + 1).map(|c| is_word_char(*c)).unwrap_or(false)
            {
                i += 1;
            } else {
                break;
            }
        }
        units.push(start..i);
    }
    units
}

fn runs(chars: &[char], inside: impl Fn(char) -> bool) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut start = None;
    for (i, &c) in chars.iter().enumerate() {
        match (inside(c), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                units.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        units.push(s..chars.len());
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, RawAnnotation, TextRun};

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_build_index_offsets() {
        let mut doc = Document::new();
        let m1 = doc.push_annotation(RawAnnotation::new(0, "Comment", "a"));
        let m2 = doc.push_annotation(RawAnnotation::new(0, "Comment", "b"));
        let mut p = Paragraph::new();
        p.add_text("ab");
        p.add_run(TextRun::italic("cd"));
        p.add_marker(m1);
        p.add_marker(m2);
        p.add_line_break();
        p.add_text("e");
        p.add_marker_end(m1);
        doc.add_paragraph(Paragraph::with_text("first"));
        doc.add_paragraph(p);

        let (stream, index) = build_index(&doc);
        assert_eq!(stream.paragraphs.len(), 2);
        assert_eq!(stream.paragraphs[1].atoms.len(), 6);
        assert_eq!(index.offset(m1), Some(AnchorOffset { paragraph: 1, offset: 4 }));
        assert_eq!(index.offset(m2), index.offset(m1));
        assert_eq!(index.end_offset(m1).map(|o| o.offset), Some(6));
        assert!(index.end_offset(m2).is_none());
        assert!(stream.paragraphs[1].atoms[2].style.italic);
        assert_eq!(stream.paragraphs[1].atoms[4].kind, AtomKind::LineBreak);
    }

    #[test]
    fn test_word_units() {
        let s = chars("Don't stop—re-enter, “now”!");
        let units: Vec<String> = UnitSplitter::Word
            .units(&s)
            .into_iter()
            .map(|r| s[r].iter().collect())
            .collect();
        assert_eq!(units, vec!["Don't", "stop", "re-enter", "now"]);
    }

    #[test]
    fn test_word_units_with_accents_and_soft_hyphen() {
        let words = UnitSplitter::Word.units_of("Labyrint světa a\u{AD}ráj srdce");
        assert_eq!(words, vec!["Labyrint", "světa", "a\u{AD}ráj", "srdce"]);
    }

    #[test]
    fn test_whitespace_units() {
        let words = UnitSplitter::Whitespace.units_of("  a, b.\tc ");
        assert_eq!(words, vec!["a,", "b.", "c"]);
    }

    #[test]
    fn test_pattern_units() {
        let splitter = UnitSplitter::new(&UnitRule::Pattern(r"\d+".into())).unwrap();
        let s = chars("ž12 x 345");
        assert_eq!(splitter.units(&s), vec![1..3, 6..9]);
    }

    #[test]
    fn test_trim_to_kept() {
        let mut p = StreamParagraph::default();
        for ch in "<x>ab".chars() {
            p.atoms.push(Atom {
                ch,
                style: TextStyle::default(),
                kind: AtomKind::Char,
                kept: true,
            });
        }
        for a in &mut p.atoms[0..3] {
            a.kept = false;
        }
        assert_eq!(p.trim_to_kept(0..5), Some(3..5));
        assert_eq!(p.trim_to_kept(0..3), None);
        assert_eq!(p.kept_text(0..5), "ab");
        assert_eq!(p.raw_text(), "<x>ab");
    }

    #[test]
    fn test_kept_units_skip_removed_runs() {
        let mut p = StreamParagraph::default();
        for ch in "Labyrint <PE_12>světa a svě<PE_3>ta".chars() {
            p.atoms.push(Atom {
                ch,
                style: TextStyle::default(),
                kind: AtomKind::Char,
                kept: true,
            });
        }
        for range in [9..16, 27..33] {
            for a in &mut p.atoms[range] {
                a.kept = false;
            }
        }

        let kept = UnitSplitter::Word.kept_units(&p);
        assert_eq!(kept, vec![0..8, 16..21, 22..23, 24..35]);
        assert_eq!(p.kept_text(kept[3].clone()), "světa");

        // Over all atoms the tag text forms units of its own.
        let raw = UnitSplitter::Word.paragraph_units(&p);
        assert_eq!(raw[1], 10..12);
    }

    #[test]
    fn test_offset_display() {
        let offset = AnchorOffset {
            paragraph: 0,
            offset: 7,
        };
        assert_eq!(offset.to_string(), "p1:7");
    }
}
