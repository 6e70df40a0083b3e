//! Conversion statistics.

use serde::{Deserialize, Serialize};

/// Statistics collected during one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Number of paragraphs (headings included)
    pub paragraph_count: u32,

    /// Number of headings
    pub heading_count: u32,

    /// Annotations found in the source
    pub annotation_count: u32,

    /// Annotations woven into the TEI output
    pub placed_count: u32,

    /// Comments that could not be placed
    pub lost_comment_count: u32,

    /// Apparatus entries that could not be placed
    pub lost_apparatus_count: u32,

    /// Unclassifiable or malformed annotations
    pub problematic_count: u32,

    /// Characters removed by normalization
    pub removed_char_count: u32,

    /// Page-break milestones emitted
    pub milestone_count: u32,

    /// Approximate word count of the kept text
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,
}

impl ConversionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        // Word count: whitespace-separated tokens
        self.word_count += text.split_whitespace().count() as u32;

        // Character count: non-whitespace characters
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Annotations that did not reach the output.
    pub fn lost_count(&self) -> u32 {
        self.lost_comment_count + self.lost_apparatus_count
    }

    /// Every annotation is accounted for exactly once.
    pub fn is_conserved(&self) -> bool {
        self.placed_count + self.lost_count() + self.problematic_count == self.annotation_count
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ConversionStats) {
        self.paragraph_count += other.paragraph_count;
        self.heading_count += other.heading_count;
        self.annotation_count += other.annotation_count;
        self.placed_count += other.placed_count;
        self.lost_comment_count += other.lost_comment_count;
        self.lost_apparatus_count += other.lost_apparatus_count;
        self.problematic_count += other.problematic_count;
        self.removed_char_count += other.removed_char_count;
        self.milestone_count += other.milestone_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_text() {
        let mut stats = ConversionStats::new();
        stats.count_text("Labyrint světa a ráj srdce.");

        assert_eq!(stats.word_count, 5);
        assert_eq!(stats.char_count, 23);
    }

    #[test]
    fn test_conservation() {
        let stats = ConversionStats {
            annotation_count: 5,
            placed_count: 2,
            lost_comment_count: 1,
            lost_apparatus_count: 1,
            problematic_count: 1,
            ..Default::default()
        };
        assert!(stats.is_conserved());
        assert_eq!(stats.lost_count(), 2);

        let broken = ConversionStats {
            annotation_count: 1,
            ..Default::default()
        };
        assert!(!broken.is_conserved());
    }

    #[test]
    fn test_merge() {
        let mut a = ConversionStats {
            paragraph_count: 5,
            placed_count: 2,
            ..Default::default()
        };
        let b = ConversionStats {
            paragraph_count: 3,
            placed_count: 1,
            problematic_count: 4,
            ..Default::default()
        };
        a.merge(&b);

        assert_eq!(a.paragraph_count, 8);
        assert_eq!(a.placed_count, 3);
        assert_eq!(a.problematic_count, 4);
    }
}
