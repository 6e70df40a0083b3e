//! Placement of annotations on the character stream.

use super::anchor::{AnchorIndex, AnchorOffset, StreamParagraph, TextStream, UnitSplitter};
use crate::config::{AttachSide, EngineConfig};
use crate::error::Result;
use crate::model::{AnnotationId, ApparatusEntry, MarkerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use unicode_normalization::UnicodeNormalization;

/// Where a placed annotation goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionPoint {
    /// Paragraph index
    pub paragraph: usize,
    /// First atom of the span
    pub start: usize,
    /// One past the last atom of the span
    pub end: usize,
}

impl InsertionPoint {
    /// Atom range of the span.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Why an annotation could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LossReason {
    /// No marker offset, or the target text was removed
    Unanchored,
    /// The span crosses the span of an annotation placed earlier
    OverlappingSpan {
        /// The annotation that kept its place
        with: AnnotationId,
    },
    /// A ranged annotation starts and ends in different paragraphs
    CrossesParagraph,
    /// The apparatus lemma does not occur at the anchor
    LemmaMismatch,
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossReason::Unanchored => write!(f, "unanchored"),
            LossReason::OverlappingSpan { with } => write!(f, "overlapping span (with {})", with),
            LossReason::CrossesParagraph => write!(f, "span crosses paragraph boundary"),
            LossReason::LemmaMismatch => write!(f, "lemma not found at anchor"),
        }
    }
}

/// Result of placing one annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlacementOutcome {
    /// The annotation wraps the given span
    Placed(InsertionPoint),
    /// The annotation goes to a ledger
    Lost {
        /// Why
        reason: LossReason,
    },
}

impl PlacementOutcome {
    /// Shorthand for a loss.
    pub fn lost(reason: LossReason) -> Self {
        PlacementOutcome::Lost { reason }
    }

    /// Check if the annotation was placed.
    pub fn is_placed(&self) -> bool {
        matches!(self, PlacementOutcome::Placed(_))
    }

    /// Insertion point of a placed annotation.
    pub fn point(&self) -> Option<InsertionPoint> {
        match self {
            PlacementOutcome::Placed(p) => Some(*p),
            PlacementOutcome::Lost { .. } => None,
        }
    }
}

/// What is being placed.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// An editorial comment (spans its unit or range)
    Comment,
    /// An apparatus entry (spans its lemma)
    Apparatus(&'a ApparatusEntry),
    /// A footnote or endnote, placed where its marker stands
    Note,
}

/// An annotation waiting for placement.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Annotation id
    pub id: AnnotationId,
    /// Its marker
    pub marker: MarkerId,
    /// Comment or apparatus
    pub target: Target<'a>,
}

/// Units of one paragraph, over all atoms and over kept atoms only.
#[derive(Debug, Clone)]
struct ParagraphUnits {
    raw: Vec<Range<usize>>,
    kept: Vec<Range<usize>>,
}

/// Resolves target spans and records one decision per annotation.
#[derive(Debug, Clone)]
pub struct Placer {
    splitter: UnitSplitter,
    side: AttachSide,
    verify_lemma: bool,
    max_lemma_units: usize,
}

impl Placer {
    /// Build a placer from the engine configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            splitter: UnitSplitter::new(&config.unit_rule)?,
            side: config.point_attachment,
            verify_lemma: config.verify_lemma,
            max_lemma_units: config.max_lemma_units,
        })
    }

    /// Place candidates in the given (document) order.
    pub fn resolve(
        &self,
        stream: &TextStream,
        index: &AnchorIndex,
        candidates: &[Candidate<'_>],
    ) -> Vec<(AnnotationId, PlacementOutcome)> {
        let mut units: HashMap<usize, ParagraphUnits> = HashMap::new();
        let mut placed: HashMap<usize, Vec<(Range<usize>, AnnotationId)>> = HashMap::new();
        let mut decisions = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let outcome = match self.span(stream, index, &mut units, candidate) {
                Ok((paragraph, span)) => {
                    let siblings = placed.entry(paragraph).or_default();
                    match siblings.iter().find(|(other, _)| crosses(&span, other)) {
                        Some((_, with)) => {
                            PlacementOutcome::lost(LossReason::OverlappingSpan { with: *with })
                        }
                        None => {
                            siblings.push((span.clone(), candidate.id));
                            PlacementOutcome::Placed(InsertionPoint {
                                paragraph,
                                start: span.start,
                                end: span.end,
                            })
                        }
                    }
                }
                Err(reason) => PlacementOutcome::lost(reason),
            };
            if let PlacementOutcome::Lost { reason } = &outcome {
                log::debug!("annotation {} lost: {}", candidate.id, reason);
            }
            decisions.push((candidate.id, outcome));
        }
        decisions
    }

    fn span(
        &self,
        stream: &TextStream,
        index: &AnchorIndex,
        cache: &mut HashMap<usize, ParagraphUnits>,
        candidate: &Candidate<'_>,
    ) -> std::result::Result<(usize, Range<usize>), LossReason> {
        let start = index.offset(candidate.marker).ok_or(LossReason::Unanchored)?;
        let paragraph = stream
            .paragraphs
            .get(start.paragraph)
            .ok_or(LossReason::Unanchored)?;
        if let Target::Note = candidate.target {
            return Ok((start.paragraph, start.offset..start.offset));
        }
        let units = cache
            .entry(start.paragraph)
            .or_insert_with(|| ParagraphUnits {
                raw: self.splitter.paragraph_units(paragraph),
                kept: self.splitter.kept_units(paragraph),
            });

        let span = match index.end_offset(candidate.marker) {
            Some(end) => self.ranged_span(paragraph, units, start, end, candidate)?,
            None => self.point_span(paragraph, units, start.offset, candidate)?,
        };

        let span = paragraph
            .trim_to_kept(span)
            .ok_or(LossReason::Unanchored)?;
        Ok((start.paragraph, span))
    }

    fn ranged_span(
        &self,
        paragraph: &StreamParagraph,
        units: &ParagraphUnits,
        start: AnchorOffset,
        end: AnchorOffset,
        candidate: &Candidate<'_>,
    ) -> std::result::Result<Range<usize>, LossReason> {
        if end.paragraph != start.paragraph {
            return Err(LossReason::CrossesParagraph);
        }
        if end.offset < start.offset {
            return Err(LossReason::Unanchored);
        }
        let inside: Vec<&Range<usize>> = units
            .kept
            .iter()
            .filter(|u| u.end > start.offset && u.start < end.offset)
            .collect();
        match (inside.first(), inside.last()) {
            (Some(first), Some(last)) => Ok(first.start..last.end),
            _ => self.point_span(paragraph, units, start.offset, candidate),
        }
    }

    /// Span of a point marker.
    ///
    /// Units come from the kept text, so removed control text between words
    /// is invisible. A marker whose own unit was removed entirely has lost
    /// its target; only a verified lemma may still place it.
    fn point_span(
        &self,
        paragraph: &StreamParagraph,
        units: &ParagraphUnits,
        offset: usize,
        candidate: &Candidate<'_>,
    ) -> std::result::Result<Range<usize>, LossReason> {
        let target_removed = attach_unit(&units.raw, offset, self.side)
            .map(|(k, _)| paragraph.trim_to_kept(units.raw[k].clone()).is_none())
            .unwrap_or(false);
        let kept = &units.kept;
        let (k, side) = attach_unit(kept, offset, self.side).ok_or(LossReason::Unanchored)?;
        match candidate.target {
            Target::Apparatus(entry) if self.verify_lemma || !target_removed => {
                let (a, b) = self.lemma_window(paragraph, kept, k, side, &entry.lemma)?;
                Ok(kept[a].start..kept[b].end)
            }
            Target::Comment if !target_removed => Ok(kept[k].clone()),
            _ => Err(LossReason::Unanchored),
        }
    }

    /// Unit window `a..=b` covering the lemma near unit `k`.
    fn lemma_window(
        &self,
        paragraph: &StreamParagraph,
        units: &[Range<usize>],
        k: usize,
        side: AttachSide,
        lemma: &str,
    ) -> std::result::Result<(usize, usize), LossReason> {
        let parts = split_ellipsis(lemma);
        let whole: usize = parts.iter().map(|p| self.splitter.units_of(p).len()).sum();

        if !self.verify_lemma || fold(lemma).is_empty() {
            return Ok(count_window(units.len(), k, whole.max(1), side));
        }

        let text_of = |a: usize, b: usize| fold(&paragraph.kept_text(units[a].start..units[b].end));

        let last = parts.last().copied().unwrap_or(lemma);
        let last_len = self.splitter.units_of(last).len().max(1);
        let last_folded = fold(last);

        for (a, b) in self.windows(units.len(), k, last_len, side) {
            if text_of(a, b) != last_folded {
                continue;
            }
            if parts.len() < 2 {
                return Ok((a, b));
            }
            let first = parts[0];
            let first_len = self.splitter.units_of(first).len().max(1);
            let first_folded = fold(first);
            let lowest = b.saturating_sub(self.max_lemma_units.saturating_sub(1));
            let mut s = a;
            while s >= first_len && s - first_len >= lowest {
                let fa = s - first_len;
                if text_of(fa, s - 1) == first_folded {
                    return Ok((fa, b));
                }
                s -= 1;
            }
        }
        Err(LossReason::LemmaMismatch)
    }

    /// Candidate windows of `len` units near unit `k`, nearest first.
    ///
    /// Windows containing `k` come first, then windows moving away from the
    /// marker on the attachment side, up to the search limit.
    fn windows(&self, total: usize, k: usize, len: usize, side: AttachSide) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        if len > total {
            return out;
        }
        match side {
            AttachSide::Closing => {
                let ends = (k..(k + len).min(total)).chain((0..k).rev());
                for end in ends.take(self.max_lemma_units) {
                    if end + 1 >= len {
                        out.push((end + 1 - len, end));
                    }
                }
            }
            AttachSide::Opening => {
                let starts = (k.saturating_sub(len - 1)..=k).rev().chain(k + 1..total);
                for start in starts.take(self.max_lemma_units) {
                    if start + len <= total {
                        out.push((start, start + len - 1));
                    }
                }
            }
        }
        out
    }
}

/// Index of the unit a point marker attaches to, and the side used.
fn attach_unit(
    units: &[Range<usize>],
    offset: usize,
    side: AttachSide,
) -> Option<(usize, AttachSide)> {
    if let Some(k) = units.iter().position(|u| u.start < offset && offset < u.end) {
        return Some((k, side));
    }
    let find = |side: AttachSide| match side {
        AttachSide::Closing => units.iter().rposition(|u| u.end <= offset),
        AttachSide::Opening => units.iter().position(|u| u.start >= offset),
    };
    find(side)
        .map(|k| (k, side))
        .or_else(|| find(side.opposite()).map(|k| (k, side.opposite())))
}

/// Window of `len` units anchored at unit `k`, clamped to the paragraph.
fn count_window(total: usize, k: usize, len: usize, side: AttachSide) -> (usize, usize) {
    match side {
        AttachSide::Closing => (k.saturating_sub(len - 1), k),
        AttachSide::Opening => (k, (k + len - 1).min(total.saturating_sub(1))),
    }
}

/// Whether two spans truly cross (overlap without one containing the other).
fn crosses(a: &Range<usize>, b: &Range<usize>) -> bool {
    let overlap = a.start < b.end && b.start < a.end;
    let nested = (a.start <= b.start && b.end <= a.end) || (b.start <= a.start && a.end <= b.end);
    overlap && !nested
}

/// Split a lemma at an ellipsis into its non-empty parts.
fn split_ellipsis(lemma: &str) -> Vec<&str> {
    lemma
        .split('…')
        .flat_map(|p| p.split("..."))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Fold text for lemma comparison: strip accents, lowercase, turn
/// punctuation runs into single spaces.
pub fn fold(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
