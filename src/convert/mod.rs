//! The conversion engine.
//!
//! An [`Engine`] wires the pipeline stages together: parse the source,
//! classify annotations, parse apparatus entries, index and normalize the
//! character stream, place annotations, then write TEI and the ledgers.
//! The engine is immutable once built and can be shared across threads.
//!
//! # Example
//!
//! ```no_run
//! use odtei::config::EngineConfig;
//! use odtei::convert::Engine;
//!
//! fn main() -> odtei::Result<()> {
//!     let engine = Engine::new(EngineConfig::default().with_witness("W", "W"))?;
//!     let conversion = engine.convert_file("content.xml")?;
//!     println!("{}", conversion.tei);
//!     Ok(())
//! }
//! ```

mod output;

pub use output::{Artifact, OutputSet};

use crate::annotate::{
    build_index, ApparatusParser, Candidate, Classifier, DiagnosticsCollector, Ledger, Normalizer,
    Placer, PlacementOutcome, ProblemReason, Target,
};
use crate::config::{EngineConfig, Settings};
use crate::detect::{detect_format_from_bytes, detect_format_from_path};
use crate::error::Result;
use crate::model::{
    AnnotationId, AnnotationKind, AnnotationSource, ApparatusEntry, Document, RawAnnotation,
};
use crate::parser::{ParseOptions, SourceParser};
use crate::render::{
    ledger, to_json, to_tei, AnnotatedTree, ConversionStats, JsonFormat, PlacedSpan, RenderOptions,
    SpanBody,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Whether every annotation made it into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// All ledgers are empty
    Complete,
    /// Some annotations are lost or problematic
    Partial,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::Complete => write!(f, "complete"),
            ConversionStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Result of converting one document.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// The TEI document
    pub tei: String,

    /// Lost and problematic annotations
    pub ledger: Ledger,

    /// Conversion statistics
    pub stats: ConversionStats,

    /// Placement decision for every comment and apparatus entry, in order
    pub outcomes: Vec<(AnnotationId, PlacementOutcome)>,
}

#[derive(Serialize)]
struct Report<'a> {
    status: ConversionStatus,
    stats: &'a ConversionStats,
    ledger: &'a Ledger,
    outcomes: &'a [(AnnotationId, PlacementOutcome)],
}

impl Conversion {
    /// Complete when nothing was lost, partial otherwise.
    pub fn status(&self) -> ConversionStatus {
        if self.ledger.is_empty() {
            ConversionStatus::Complete
        } else {
            ConversionStatus::Partial
        }
    }

    /// Placement decision of one annotation.
    pub fn outcome(&self, id: AnnotationId) -> Option<&PlacementOutcome> {
        self.outcomes.iter().find(|(i, _)| *i == id).map(|(_, o)| o)
    }

    /// Rendered artifacts: TEI followed by the three ledgers.
    pub fn outputs(&self) -> Vec<(Artifact, String)> {
        vec![
            (Artifact::Tei, self.tei.clone()),
            (Artifact::LostComments, ledger::lost_comments(&self.ledger)),
            (Artifact::LostApparatus, ledger::lost_apparatus(&self.ledger)),
            (Artifact::Problematic, ledger::problematic(&self.ledger)),
        ]
    }

    /// Status, statistics, ledgers and decisions as JSON.
    pub fn report_json(&self, format: JsonFormat) -> Result<String> {
        to_json(
            &Report {
                status: self.status(),
                stats: &self.stats,
                ledger: &self.ledger,
                outcomes: &self.outcomes,
            },
            format,
        )
    }
}

/// Converts OpenDocument manuscripts to TEI.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    parse_options: ParseOptions,
    render_options: RenderOptions,
    classifier: Classifier,
    apparatus: ApparatusParser,
    normalizer: Normalizer,
    placer: Placer,
}

impl Engine {
    /// Validate the configuration and build the engine.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: Classifier::new(&config),
            apparatus: ApparatusParser::new(&config)?,
            normalizer: Normalizer::new(&config.normalization)?,
            placer: Placer::new(&config)?,
            parse_options: ParseOptions::default(),
            render_options: RenderOptions::default(),
            config,
        })
    }

    /// Build an engine from loaded settings.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        Ok(Self::new(settings.engine)?
            .with_parse_options(settings.parse)
            .with_render_options(settings.render))
    }

    /// Set source parsing options.
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Set TEI rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse a source document without converting it.
    pub fn parse_bytes(&self, data: &[u8]) -> Result<Document> {
        SourceParser::with_options(self.parse_options.clone()).parse_bytes(data)
    }

    /// Convert source markup held in a string.
    pub fn convert_str(&self, xml: &str) -> Result<Conversion> {
        self.convert_bytes(xml.as_bytes())
    }

    /// Convert source markup from bytes.
    pub fn convert_bytes(&self, data: &[u8]) -> Result<Conversion> {
        let format = detect_format_from_bytes(data)?;
        log::debug!("converting {}", format);
        let doc = self.parse_bytes(data)?;
        self.convert_document(&doc)
    }

    /// Convert a `content.xml` part or a flat `.fodt` file.
    pub fn convert_file<P: AsRef<Path>>(&self, path: P) -> Result<Conversion> {
        let path = path.as_ref();
        let format = detect_format_from_path(path)?;
        log::debug!("converting {} ({})", path.display(), format);
        let data = std::fs::read(path)?;
        let doc = self.parse_bytes(&data)?;
        self.convert_document(&doc)
    }

    /// Convert many files in parallel. Results keep the input order.
    pub fn convert_many<P>(&self, paths: &[P]) -> Vec<Result<Conversion>>
    where
        P: AsRef<Path> + Sync,
    {
        paths.par_iter().map(|p| self.convert_file(p)).collect()
    }

    /// Convert a parsed document.
    pub fn convert_document(&self, doc: &Document) -> Result<Conversion> {
        let mut diagnostics = DiagnosticsCollector::new();

        // Classify and parse; problematic annotations stop here.
        let mut pending: Vec<(&RawAnnotation, Option<ApparatusEntry>)> = Vec::new();
        for raw in &doc.annotations {
            match self.classifier.classify(raw) {
                AnnotationKind::Comment => pending.push((raw, None)),
                AnnotationKind::ApparatusEntry => match self.apparatus.parse(&raw.raw_text) {
                    Ok(entry) => pending.push((raw, Some(entry))),
                    Err(e) => diagnostics.problematic(raw, e.into()),
                },
                AnnotationKind::Unclassifiable => {
                    diagnostics.problematic(raw, ProblemReason::UnknownStyle)
                }
            }
        }

        let (mut stream, index) = build_index(doc);
        self.normalizer.apply(&mut stream);

        let candidates: Vec<Candidate<'_>> = pending
            .iter()
            .map(|(raw, entry)| Candidate {
                id: raw.id,
                marker: raw.marker,
                target: match (entry, raw.source) {
                    (Some(entry), _) => Target::Apparatus(entry),
                    (None, AnnotationSource::Comment) => Target::Comment,
                    (None, _) => Target::Note,
                },
            })
            .collect();
        let outcomes = self.placer.resolve(&stream, &index, &candidates);

        let mut spans = Vec::new();
        for ((raw, entry), (_, outcome)) in pending.iter().zip(&outcomes) {
            match (outcome, entry) {
                (PlacementOutcome::Placed(point), _) => spans.push(PlacedSpan {
                    id: raw.id,
                    paragraph: point.paragraph,
                    range: point.range(),
                    body: match (entry, raw.source) {
                        (Some(entry), _) => SpanBody::Apparatus {
                            entry: entry.clone(),
                        },
                        (None, AnnotationSource::Comment) => SpanBody::Comment {
                            text: raw.raw_text.clone(),
                        },
                        (None, source) => SpanBody::Note {
                            text: raw.raw_text.clone(),
                            source,
                            citation: raw.citation.clone(),
                        },
                    },
                }),
                (PlacementOutcome::Lost { reason }, Some(entry)) => {
                    diagnostics.lost_apparatus(raw, entry, index.offset(raw.marker), *reason)?
                }
                (PlacementOutcome::Lost { reason }, None) => {
                    diagnostics.lost_comment(raw, index.offset(raw.marker), *reason)
                }
            }
        }

        // Configured witnesses plus every siglum the entries mention
        let witnesses: BTreeSet<String> = self
            .config
            .witness_ids()
            .into_iter()
            .chain(
                pending
                    .iter()
                    .filter_map(|(_, entry)| entry.as_ref())
                    .flat_map(|entry| entry.sigla.iter().cloned()),
            )
            .collect();

        let placed: Vec<AnnotationId> = spans.iter().map(|s| s.id).collect();
        let tree = AnnotatedTree::build(&stream, spans, self.config.nesting);
        let tei = to_tei(
            &tree,
            &doc.metadata,
            witnesses.into_iter().collect(),
            &placed,
            &self.render_options,
        )?;

        let ledger = diagnostics.finish();
        let mut stats = ConversionStats {
            paragraph_count: doc.paragraph_count() as u32,
            heading_count: doc.paragraphs.iter().filter(|p| p.is_heading()).count() as u32,
            annotation_count: doc.annotation_count() as u32,
            placed_count: placed.len() as u32,
            lost_comment_count: ledger.lost_comments.len() as u32,
            lost_apparatus_count: ledger.lost_apparatus.len() as u32,
            problematic_count: ledger.problematic.len() as u32,
            removed_char_count: stream.removed_count() as u32,
            milestone_count: stream.paragraphs.iter().map(|p| p.milestones.len()).sum::<usize>()
                as u32,
            ..Default::default()
        };
        for paragraph in &stream.paragraphs {
            stats.count_text(&paragraph.kept_text(0..paragraph.atoms.len()));
        }
        if !stats.is_conserved() {
            log::warn!(
                "annotation count mismatch: {} found, {} accounted for",
                stats.annotation_count,
                stats.placed_count + stats.lost_count() + stats.problematic_count
            );
        }
        log::debug!(
            "placed {} of {} annotations ({} lost, {} problematic)",
            stats.placed_count,
            stats.annotation_count,
            stats.lost_count(),
            stats.problematic_count
        );

        Ok(Conversion {
            tei,
            ledger,
            stats,
            outcomes,
        })
    }
}
