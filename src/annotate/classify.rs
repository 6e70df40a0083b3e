//! Annotation classification by style.

use crate::config::EngineConfig;
use crate::model::{AnnotationKind, RawAnnotation};
use crate::parser::decode_style_name;
use std::collections::HashSet;

/// Tags raw annotations as comments, apparatus entries or neither.
///
/// Styles are compared by their decoded display names, so `Apparatus_20_text`
/// in the source matches `Apparatus text` in the configuration and the other
/// way round.
#[derive(Debug, Clone)]
pub struct Classifier {
    apparatus: HashSet<String>,
    comment: HashSet<String>,
}

impl Classifier {
    /// Build a classifier from the configured style sets.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            apparatus: config
                .apparatus_styles
                .iter()
                .map(|s| decode_style_name(s))
                .collect(),
            comment: config
                .comment_styles
                .iter()
                .map(|s| decode_style_name(s))
                .collect(),
        }
    }

    /// Classify a style chain. Apparatus styles win over comment styles.
    pub fn classify_chain<S: AsRef<str>>(&self, chain: &[S]) -> AnnotationKind {
        let decoded: Vec<String> = chain.iter().map(|s| decode_style_name(s.as_ref())).collect();
        if decoded.iter().any(|s| self.apparatus.contains(s)) {
            AnnotationKind::ApparatusEntry
        } else if decoded.iter().any(|s| self.comment.contains(s)) {
            AnnotationKind::Comment
        } else {
            AnnotationKind::Unclassifiable
        }
    }

    /// Classify one annotation.
    pub fn classify(&self, raw: &RawAnnotation) -> AnnotationKind {
        self.classify_chain(&raw.style_chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(
            &EngineConfig::new()
                .with_apparatus_styles(["Apparatus text"])
                .with_comment_styles(["Comment"]),
        )
    }

    #[test]
    fn test_classify_by_style() {
        let c = classifier();
        assert_eq!(
            c.classify(&RawAnnotation::new(1, "Apparatus_20_text", "x")),
            AnnotationKind::ApparatusEntry
        );
        assert_eq!(
            c.classify(&RawAnnotation::new(2, "Comment", "x")),
            AnnotationKind::Comment
        );
        assert_eq!(
            c.classify(&RawAnnotation::new(3, "Standard", "x")),
            AnnotationKind::Unclassifiable
        );
    }

    #[test]
    fn test_parent_style_counts() {
        let c = classifier();
        let mut raw = RawAnnotation::new(1, "P4", "x");
        raw.style_chain.push("Comment".into());
        assert_eq!(c.classify(&raw), AnnotationKind::Comment);
    }

    #[test]
    fn test_apparatus_has_priority() {
        let c = classifier();
        assert_eq!(
            c.classify_chain(&["Comment", "Apparatus_20_text"][..]),
            AnnotationKind::ApparatusEntry
        );
    }

    #[test]
    fn test_no_style_is_unclassifiable() {
        let c = classifier();
        let mut raw = RawAnnotation::new(1, "x", "x");
        raw.style_name = None;
        raw.style_chain.clear();
        assert_eq!(c.classify(&raw), AnnotationKind::Unclassifiable);
    }
}
