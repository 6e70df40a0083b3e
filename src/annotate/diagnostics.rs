//! Failure ledgers.
//!
//! Every annotation that does not make it into the TEI output ends up in
//! exactly one of three ledgers, with enough context to fix the source.

use super::anchor::AnchorOffset;
use super::apparatus::GrammarError;
use super::placement::LossReason;
use crate::error::Result;
use crate::model::{AnnotationId, ApparatusEntry, RawAnnotation};
use crate::render::tei::apparatus_fragment;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A comment that could not be placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostComment {
    pub id: AnnotationId,
    pub location: Option<AnchorOffset>,
    pub reason: LossReason,
    pub author: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub raw_text: String,
}

/// An apparatus entry that parsed but could not be placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostApparatus {
    pub id: AnnotationId,
    pub location: Option<AnchorOffset>,
    pub reason: LossReason,
    pub lemma: String,
    pub sigla: Vec<String>,
    pub raw_text: String,
    /// The entry as a detached `app` element
    pub fragment: String,
}

/// Why an annotation is problematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum ProblemReason {
    /// The style matches neither style set
    UnknownStyle,
    /// The apparatus text does not follow the entry grammar
    Grammar {
        /// Grammar failure
        error: GrammarError,
    },
}

impl fmt::Display for ProblemReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemReason::UnknownStyle => write!(f, "unknown style"),
            ProblemReason::Grammar { error } => write!(f, "{}", error),
        }
    }
}

impl From<GrammarError> for ProblemReason {
    fn from(error: GrammarError) -> Self {
        ProblemReason::Grammar { error }
    }
}

/// A malformed or unclassifiable annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: AnnotationId,
    /// Style name as written in the source, `-` when absent
    pub style: String,
    /// Style and its ancestors, as used for classification
    pub style_chain: Vec<String>,
    pub reason: ProblemReason,
    /// Raw annotation text, verbatim
    pub raw_text: String,
}

/// The three ledgers of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub lost_comments: Vec<LostComment>,
    pub lost_apparatus: Vec<LostApparatus>,
    pub problematic: Vec<ProblemRecord>,
}

impl Ledger {
    /// Check if all three ledgers are empty.
    pub fn is_empty(&self) -> bool {
        self.lost_comments.is_empty() && self.lost_apparatus.is_empty() && self.problematic.is_empty()
    }

    /// Number of lost annotations of both kinds.
    pub fn lost_count(&self) -> usize {
        self.lost_comments.len() + self.lost_apparatus.len()
    }

    /// Number of records across all ledgers.
    pub fn len(&self) -> usize {
        self.lost_count() + self.problematic.len()
    }

    /// Check if an annotation is recorded anywhere.
    pub fn contains(&self, id: AnnotationId) -> bool {
        self.lost_comments.iter().any(|r| r.id == id)
            || self.lost_apparatus.iter().any(|r| r.id == id)
            || self.problematic.iter().any(|r| r.id == id)
    }
}

/// Appends ledger records as the pipeline reports them.
#[derive(Debug, Default)]
pub struct DiagnosticsCollector {
    ledger: Ledger,
}

impl DiagnosticsCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an annotation that never reached placement.
    pub fn problematic(&mut self, raw: &RawAnnotation, reason: ProblemReason) {
        log::debug!("annotation {} problematic: {}", raw.id, reason);
        self.ledger.problematic.push(ProblemRecord {
            id: raw.id,
            style: raw.style_label().to_string(),
            style_chain: raw.style_chain.clone(),
            reason,
            raw_text: raw.raw_text.clone(),
        });
    }

    /// Record a comment that could not be placed.
    pub fn lost_comment(&mut self, raw: &RawAnnotation, location: Option<AnchorOffset>, reason: LossReason) {
        self.ledger.lost_comments.push(LostComment {
            id: raw.id,
            location,
            reason,
            author: raw.author.clone(),
            date: raw.date,
            raw_text: raw.raw_text.clone(),
        });
    }

    /// Record an apparatus entry that could not be placed.
    pub fn lost_apparatus(
        &mut self,
        raw: &RawAnnotation,
        entry: &ApparatusEntry,
        location: Option<AnchorOffset>,
        reason: LossReason,
    ) -> Result<()> {
        let fragment = apparatus_fragment(raw.id, entry)?;
        self.ledger.lost_apparatus.push(LostApparatus {
            id: raw.id,
            location,
            reason,
            lemma: entry.lemma.clone(),
            sigla: entry.sigla.iter().cloned().collect(),
            raw_text: raw.raw_text.clone(),
            fragment,
        });
        Ok(())
    }

    /// Number of records so far.
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Hand over the ledgers.
    pub fn finish(self) -> Ledger {
        self.ledger
    }
}
