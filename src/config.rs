//! Engine configuration.
//!
//! An [`EngineConfig`] is an explicit value handed to
//! [`Engine::new`](crate::convert::Engine::new). It is validated once there
//! and never changes afterwards.

use crate::error::{Error, Result};
use crate::parser::{decode_style_name, ParseOptions};
use crate::render::RenderOptions;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default pattern for recognizing sigla when no witness map is configured.
pub const DEFAULT_SIGLUM_PATTERN: &str = r"^\p{Lu}\p{L}{0,3}\d*$";

/// Edition named on the page breaks of the default `<PE_n>` rule.
pub const DEFAULT_PAGE_EDITION: &str = "DJAK03";

/// How the character stream is cut into lexical units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRule {
    /// Alphanumeric runs, joined by apostrophes, soft hyphens and inner hyphens
    Word,
    /// Runs of non-whitespace characters
    Whitespace,
    /// Every match of a regular expression is one unit
    Pattern(String),
}

/// Which neighbouring unit a point marker attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachSide {
    /// The unit ending at or before the marker
    #[default]
    Closing,
    /// The unit starting at or after the marker
    Opening,
}

impl AttachSide {
    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            AttachSide::Closing => AttachSide::Opening,
            AttachSide::Opening => AttachSide::Closing,
        }
    }
}

/// Nesting of annotations that target exactly the same span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingOrder {
    /// The annotation earlier in the document is the outer element
    #[default]
    EarlierOuter,
    /// The annotation later in the document is the outer element
    LaterOuter,
}

/// What a normalization rule does with its matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    /// Drop the matched text
    Remove,
    /// Drop the matched text and emit a `pb` milestone in its place
    PageBreak {
        /// Value of `pb/@ed`
        #[serde(default)]
        edition: Option<String>,
        /// The break splits a word (`pb/@break="no"`)
        #[serde(default)]
        inside_word: bool,
    },
    /// Drop an opening tag and its closing tag, wrapping the text between
    /// them in an element. An unclosed wrap runs to the paragraph end.
    Wrap {
        /// Pattern of the closing tag
        close: String,
        /// Element name
        element: String,
        /// Element attributes
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
    /// Drop the matched text and open a new `div` at its paragraph
    Division {
        /// Value of `div/@type`
        #[serde(default, rename = "type")]
        kind: Option<String>,
        /// The paragraph becomes the division heading
        #[serde(default)]
        heading: bool,
        /// Value of `div/@xml:lang`
        #[serde(default)]
        language: Option<String>,
    },
}

/// A regular-expression rule applied to the character stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRule {
    /// Regular expression matched against each paragraph
    pub pattern: String,

    /// What happens to the matches
    #[serde(flatten)]
    pub action: RuleAction,
}

impl NormalizationRule {
    /// A rule that drops its matches.
    pub fn remove(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: RuleAction::Remove,
        }
    }

    /// A rule that turns its matches into page-break milestones.
    ///
    /// The first capture group, if any, becomes the page number.
    pub fn page_break(pattern: impl Into<String>, edition: Option<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: RuleAction::PageBreak {
                edition,
                inside_word: false,
            },
        }
    }

    /// A rule that wraps the text between `open` and `close` in `element`.
    pub fn wrap<I, K, V>(
        open: impl Into<String>,
        close: impl Into<String>,
        element: impl Into<String>,
        attributes: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pattern: open.into(),
            action: RuleAction::Wrap {
                close: close.into(),
                element: element.into(),
                attributes: attributes
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            },
        }
    }

    /// A rule that opens a division of the given type.
    pub fn division(pattern: impl Into<String>, kind: Option<&str>) -> Self {
        Self {
            pattern: pattern.into(),
            action: RuleAction::Division {
                kind: kind.map(str::to_string),
                heading: false,
                language: None,
            },
        }
    }

    /// Mark page breaks of this rule as falling inside a word.
    pub fn inside_word(mut self) -> Self {
        if let RuleAction::PageBreak { inside_word, .. } = &mut self.action {
            *inside_word = true;
        }
        self
    }

    /// Make the paragraph of a division rule its heading.
    pub fn as_heading(mut self) -> Self {
        if let RuleAction::Division { heading, .. } = &mut self.action {
            *heading = true;
        }
        self
    }

    /// Set the language of a division rule.
    pub fn in_language(mut self, lang: impl Into<String>) -> Self {
        if let RuleAction::Division { language, .. } = &mut self.action {
            *language = Some(lang.into());
        }
        self
    }
}

/// Configuration of the classification, parsing and placement stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Styles that mark critical-apparatus entries
    pub apparatus_styles: Vec<String>,

    /// Styles that mark editorial comments
    pub comment_styles: Vec<String>,

    /// Lexical unit rule
    pub unit_rule: UnitRule,

    /// Attachment side of point markers
    pub point_attachment: AttachSide,

    /// Nesting of equal spans
    pub nesting: NestingOrder,

    /// Witness aliases mapped to canonical witness ids
    pub witnesses: BTreeMap<String, String>,

    /// Witness attesting the lemma when the entry names none
    pub base_witness: Option<String>,

    /// Siglum pattern used when `witnesses` is empty
    pub siglum_pattern: String,

    /// Words joining sigla (`W a St`)
    pub conjunctions: Vec<String>,

    /// Reading texts that mean "the witness omits the lemma"
    pub omission_markers: Vec<String>,

    /// Text normalization rules, applied in order
    pub normalization: Vec<NormalizationRule>,

    /// Require the anchored span to match the apparatus lemma
    pub verify_lemma: bool,

    /// How many units the lemma search may cover
    pub max_lemma_units: usize,
}

impl EngineConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the apparatus style set.
    pub fn with_apparatus_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apparatus_styles = styles.into_iter().map(Into::into).collect();
        self
    }

    /// Set the comment style set.
    pub fn with_comment_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comment_styles = styles.into_iter().map(Into::into).collect();
        self
    }

    /// Set the lexical unit rule.
    pub fn with_unit_rule(mut self, rule: UnitRule) -> Self {
        self.unit_rule = rule;
        self
    }

    /// Set the attachment side of point markers.
    pub fn with_point_attachment(mut self, side: AttachSide) -> Self {
        self.point_attachment = side;
        self
    }

    /// Set the nesting order of equal spans.
    pub fn with_nesting(mut self, nesting: NestingOrder) -> Self {
        self.nesting = nesting;
        self
    }

    /// Add a witness alias.
    pub fn with_witness(mut self, alias: impl Into<String>, id: impl Into<String>) -> Self {
        self.witnesses.insert(alias.into(), id.into());
        self
    }

    /// Set the base witness.
    pub fn with_base_witness(mut self, id: impl Into<String>) -> Self {
        self.base_witness = Some(id.into());
        self
    }

    /// Set the siglum pattern.
    pub fn with_siglum_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.siglum_pattern = pattern.into();
        self
    }

    /// Replace the normalization rules.
    pub fn with_normalization(mut self, rules: Vec<NormalizationRule>) -> Self {
        self.normalization = rules;
        self
    }

    /// Append a normalization rule.
    pub fn with_rule(mut self, rule: NormalizationRule) -> Self {
        self.normalization.push(rule);
        self
    }

    /// Enable or disable lemma verification.
    pub fn with_verify_lemma(mut self, verify: bool) -> Self {
        self.verify_lemma = verify;
        self
    }

    /// Set the lemma search limit.
    pub fn with_max_lemma_units(mut self, units: usize) -> Self {
        self.max_lemma_units = units;
        self
    }

    /// Canonical witness ids in sorted order, including the base witness.
    pub fn witness_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.witnesses.values().cloned().collect();
        if let Some(base) = &self.base_witness {
            ids.push(base.clone());
        }
        ids.sort();
        ids.dedup();
        ids
    }

    /// Check the configuration for conflicts and unusable values.
    pub fn validate(&self) -> Result<()> {
        for style in &self.apparatus_styles {
            let decoded = decode_style_name(style);
            let clash = self
                .comment_styles
                .iter()
                .any(|c| c == style || decode_style_name(c) == decoded);
            if clash {
                return Err(Error::ConfigConflict(style.clone()));
            }
        }

        if self.apparatus_styles.is_empty() && self.comment_styles.is_empty() {
            return Err(Error::InvalidConfig(
                "no apparatus or comment styles configured".to_string(),
            ));
        }

        if let UnitRule::Pattern(pattern) = &self.unit_rule {
            if pattern.is_empty() {
                return Err(Error::InvalidConfig("empty unit pattern".to_string()));
            }
            let re = Regex::new(pattern)?;
            if re.is_match("") {
                return Err(Error::InvalidConfig(format!(
                    "unit pattern {:?} matches the empty string",
                    pattern
                )));
            }
        }

        if self.witnesses.is_empty() {
            Regex::new(&self.siglum_pattern)?;
        }

        for rule in &self.normalization {
            check_rule_pattern(&rule.pattern)?;
            if let RuleAction::Wrap {
                close,
                element,
                attributes,
            } = &rule.action
            {
                check_rule_pattern(close)?;
                check_xml_name(element)?;
                for name in attributes.keys() {
                    check_xml_name(name)?;
                }
            }
        }

        if self.max_lemma_units == 0 {
            return Err(Error::InvalidConfig(
                "max_lemma_units must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_rule_pattern(pattern: &str) -> Result<()> {
    if Regex::new(pattern)?.is_match("") {
        return Err(Error::InvalidConfig(format!(
            "normalization pattern {:?} matches the empty string",
            pattern
        )));
    }
    Ok(())
}

fn check_xml_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false)
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("invalid element or attribute name {:?}", name)))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            apparatus_styles: vec!["Apparatus".to_string()],
            comment_styles: vec![
                "Comment".to_string(),
                "Annotation".to_string(),
                "footnote".to_string(),
                "endnote".to_string(),
            ],
            unit_rule: UnitRule::Word,
            point_attachment: AttachSide::default(),
            nesting: NestingOrder::default(),
            witnesses: BTreeMap::new(),
            base_witness: None,
            siglum_pattern: DEFAULT_SIGLUM_PATTERN.to_string(),
            conjunctions: vec!["a".to_string(), "et".to_string(), "&".to_string()],
            omission_markers: vec![
                "om.".to_string(),
                "omit.".to_string(),
                "vynech.".to_string(),
            ],
            normalization: default_normalization(),
            verify_lemma: true,
            max_lemma_units: 50,
        }
    }
}

/// Editorial control text handled by default.
///
/// Page tags become `pb` milestones (a leading `|` belongs to the tag),
/// language and layout tags become wrapping elements, and division tags
/// open new `div`s. Format codes, separator pipes and soft hyphens are
/// dropped.
pub fn default_normalization() -> Vec<NormalizationRule> {
    let foreign = |tag: &str, lang: &str| {
        NormalizationRule::wrap(
            format!("<{}>", tag),
            format!("</{}>", tag),
            "foreign",
            [("xml:lang", lang)],
        )
    };
    vec![
        NormalizationRule::page_break(
            r"(?:\| ?)?<PE(?:ka|ko)?_(\d+)>",
            Some(DEFAULT_PAGE_EDITION.to_string()),
        ),
        NormalizationRule::page_break(r"(?:\| ?)?<PO(?:_(\w?\d*))?>", None).inside_word(),
        NormalizationRule::remove(r"<FO(?:_[^>]*)?>"),
        NormalizationRule::remove(r" ?\|"),
        NormalizationRule::remove("\u{AD}"),
        foreign("LAT", "la"),
        foreign("GREEK", "el"),
        foreign("GER", "de"),
        foreign("CZECH", "cs"),
        NormalizationRule::wrap("<M>", "</M>", "add", [("place", "margin")]),
        NormalizationRule::wrap("<REND_SP>", "</REND_SP>", "hi", [("rend", "spaced")]),
        NormalizationRule::wrap("<REND_I>", "</REND_I>", "hi", [("rend", "italic")]),
        NormalizationRule::division("<CHAPTER>", Some("chapter")).as_heading(),
        NormalizationRule::division(r"<PREFACE_\d_LAT>", Some("preface")).in_language("la"),
        NormalizationRule::division(r"<PREFACE_\d>", Some("preface")),
        NormalizationRule::division("<TEXT_NO_HEAD>", None),
    ]
}

/// Everything a run needs, as loaded from a JSON settings file.
///
/// Engine keys sit at the top level; parser and renderer options live under
/// `parse` and `render`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Engine configuration
    #[serde(flatten)]
    pub engine: EngineConfig,

    /// Source parsing options
    pub parse: ParseOptions,

    /// TEI rendering options
    pub render: RenderOptions,
}

impl Settings {
    /// Parse settings from a JSON string and validate them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("settings: {}", e)))?;
        settings.engine.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file and validate them.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        log::debug!("loading settings from {}", path.display());
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_style_conflict() {
        let config = EngineConfig::new()
            .with_apparatus_styles(["Apparatus"])
            .with_comment_styles(["Comment", "Apparatus"]);
        match config.validate() {
            Err(Error::ConfigConflict(style)) => assert_eq!(style, "Apparatus"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_style_conflict_through_encoded_name() {
        let config = EngineConfig::new()
            .with_apparatus_styles(["Apparatus_20_text"])
            .with_comment_styles(["Apparatus text"]);
        assert!(matches!(config.validate(), Err(Error::ConfigConflict(_))));
    }

    #[test]
    fn test_bad_patterns_are_rejected() {
        let config = EngineConfig::new().with_unit_rule(UnitRule::Pattern("(".into()));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = EngineConfig::new().with_unit_rule(UnitRule::Pattern(r"\w*".into()));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = EngineConfig::new().with_rule(NormalizationRule::remove("x?"));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = EngineConfig::new().with_max_lemma_units(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_wrap_rules_are_rejected() {
        let rule = NormalizationRule::wrap("<X>", "y*", "hi", [("rend", "x")]);
        let config = EngineConfig::new().with_rule(rule);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let rule = NormalizationRule::wrap("<X>", "</X>", "two words", [("rend", "x")]);
        let config = EngineConfig::new().with_rule(rule);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let rule = NormalizationRule::wrap("<X>", "</X>", "hi", [("1rend", "x")]);
        let config = EngineConfig::new().with_rule(rule);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_wrap_and_division_rules_from_json() {
        let json = r#"{
            "normalization": [
                {"pattern": "<LAT>", "action": "wrap", "close": "</LAT>",
                 "element": "foreign", "attributes": {"xml:lang": "la"}},
                {"pattern": "<CHAPTER>", "action": "division", "type": "chapter", "heading": true},
                {"pattern": "<PO>", "action": "page_break", "inside_word": true}
            ]
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        let rules = &settings.engine.normalization;

        assert_eq!(
            rules[0],
            NormalizationRule::wrap("<LAT>", "</LAT>", "foreign", [("xml:lang", "la")])
        );
        assert_eq!(
            rules[1],
            NormalizationRule::division("<CHAPTER>", Some("chapter")).as_heading()
        );
        assert_eq!(rules[2], NormalizationRule::page_break("<PO>", None).inside_word());
    }

    #[test]
    fn test_witness_ids() {
        let config = EngineConfig::new()
            .with_witness("A", "T1663")
            .with_witness("V", "W")
            .with_witness("W", "W")
            .with_base_witness("T1663");
        assert_eq!(config.witness_ids(), vec!["T1663".to_string(), "W".to_string()]);
    }

    #[test]
    fn test_settings_from_json() {
        let json = r#"{
            "apparatus_styles": ["Apparat"],
            "comment_styles": ["Komentar"],
            "unit_rule": {"pattern": "\\S+"},
            "point_attachment": "opening",
            "nesting": "later_outer",
            "witnesses": {"S": "St", "W": "W"},
            "normalization": [
                {"pattern": "<PE_(\\d+)>", "action": "page_break", "edition": "DJAK03"},
                {"pattern": "\\|", "action": "remove"}
            ],
            "render": {"language": "cs"}
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        let engine = &settings.engine;

        assert_eq!(engine.apparatus_styles, vec!["Apparat".to_string()]);
        assert_eq!(engine.unit_rule, UnitRule::Pattern(r"\S+".into()));
        assert_eq!(engine.point_attachment, AttachSide::Opening);
        assert_eq!(engine.nesting, NestingOrder::LaterOuter);
        assert_eq!(engine.witnesses.get("S").map(String::as_str), Some("St"));
        assert_eq!(
            engine.normalization[0].action,
            RuleAction::PageBreak {
                edition: Some("DJAK03".into()),
                inside_word: false,
            }
        );
        assert_eq!(engine.normalization[1].action, RuleAction::Remove);
        assert!(engine.verify_lemma);
        assert_eq!(settings.render.language.as_deref(), Some("cs"));
        assert!(settings.parse.collapse_whitespace);
    }

    #[test]
    fn test_settings_conflict_is_reported() {
        let json = r#"{"apparatus_styles": ["X"], "comment_styles": ["X"]}"#;
        assert!(matches!(
            Settings::from_json_str(json),
            Err(Error::ConfigConflict(_))
        ));
    }

    #[test]
    fn test_settings_unknown_json_is_invalid() {
        assert!(matches!(
            Settings::from_json_str("{not json"),
            Err(Error::InvalidConfig(_))
        ));
    }
}
