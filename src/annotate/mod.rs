//! Annotation pipeline: classification, apparatus parsing, anchoring,
//! normalization, placement and diagnostics.

pub mod anchor;
pub mod apparatus;
pub mod classify;
pub mod diagnostics;
pub mod normalize;
pub mod placement;

pub use anchor::{
    build_index, AnchorIndex, AnchorOffset, Division, Milestone, TextStream, UnitSplitter, Wrap,
};
pub use apparatus::{ApparatusParser, GrammarError};
pub use classify::Classifier;
pub use diagnostics::{
    DiagnosticsCollector, Ledger, LostApparatus, LostComment, ProblemReason, ProblemRecord,
};
pub use normalize::Normalizer;
pub use placement::{Candidate, InsertionPoint, LossReason, Placer, PlacementOutcome, Target};
