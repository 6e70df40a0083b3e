//! Style table of an OpenDocument source.

use crate::model::TextStyle;
use std::collections::HashMap;

/// Parent chains longer than this are treated as cyclic.
const MAX_CHAIN: usize = 32;

/// Style family, as given by `style:family`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleFamily {
    /// Character styles
    Text,
    /// Paragraph styles
    Paragraph,
    /// Anything else (tables, graphics, sections)
    Other,
}

impl StyleFamily {
    /// Parse the `style:family` attribute value.
    pub fn from_attr(value: &str) -> Self {
        match value {
            "text" => StyleFamily::Text,
            "paragraph" => StyleFamily::Paragraph,
            _ => StyleFamily::Other,
        }
    }
}

/// One `style:style` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDef {
    /// `style:name`
    pub name: String,
    /// `style:family`
    pub family: StyleFamily,
    /// `style:parent-style-name`
    pub parent: Option<String>,
    /// Character properties declared directly on the style
    pub text: TextStyle,
}

impl StyleDef {
    /// Create a style definition without properties.
    pub fn new(name: impl Into<String>, family: StyleFamily) -> Self {
        Self {
            name: name.into(),
            family,
            parent: None,
            text: TextStyle::default(),
        }
    }

    /// Apply one `style:text-properties` attribute.
    pub fn apply_text_property(&mut self, key: &str, value: &str) {
        match key {
            "fo:font-weight" => {
                self.text.bold = value == "bold"
                    || value.parse::<u16>().map(|w| w >= 600).unwrap_or(false);
            }
            "fo:font-style" => {
                self.text.italic = value == "italic" || value == "oblique";
            }
            "style:text-underline-style" => {
                self.text.underline = value != "none";
            }
            "fo:letter-spacing" => {
                self.text.spaced = leading_number(value).map(|n| n > 0.0).unwrap_or(false);
            }
            "style:text-position" => {
                let first = value.split_whitespace().next().unwrap_or("");
                let (sup, sub) = match first {
                    "super" => (true, false),
                    "sub" => (false, true),
                    other => match leading_number(other) {
                        Some(n) if n > 0.0 => (true, false),
                        Some(n) if n < 0.0 => (false, true),
                        _ => (false, false),
                    },
                };
                self.text.superscript = sup;
                self.text.subscript = sub;
            }
            _ => {}
        }
    }
}

/// Parse the numeric prefix of a length or percentage (`0.1cm`, `-33%`).
fn leading_number(value: &str) -> Option<f64> {
    let end = value
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// All named styles of a document, automatic and common.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    styles: HashMap<(StyleFamily, String), StyleDef>,
}

impl StyleSheet {
    /// Create an empty style sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a style definition, replacing an earlier one of the same name.
    pub fn define(&mut self, def: StyleDef) {
        self.styles.insert((def.family, def.name.clone()), def);
    }

    /// Number of defined styles.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Check if no styles are defined.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// The style name followed by its ancestors.
    ///
    /// Unknown names yield a chain of just the name itself.
    pub fn chain(&self, family: StyleFamily, name: &str) -> Vec<String> {
        let mut chain = vec![name.to_string()];
        let mut current = name;
        while let Some(parent) = self
            .styles
            .get(&(family, current.to_string()))
            .and_then(|d| d.parent.as_deref())
        {
            if chain.len() >= MAX_CHAIN || chain.iter().any(|c| c == parent) {
                log::warn!("style parent chain of {} is cyclic or too deep", name);
                break;
            }
            chain.push(parent.to_string());
            current = parent;
        }
        chain
    }

    /// Character style of a named style, inherited properties included.
    pub fn text_style(&self, family: StyleFamily, name: &str) -> TextStyle {
        self.chain(family, name)
            .iter()
            .filter_map(|n| self.styles.get(&(family, n.clone())))
            .fold(TextStyle::default(), |acc, def| acc.merge(def.text))
    }
}

/// Decode an ODF-encoded style name (`Apparatus_20_text` → `Apparatus text`).
///
/// ODF replaces characters that are not allowed in XML names with `_XX_`,
/// where `XX` is the hexadecimal code point.
pub fn decode_style_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(start) = rest.find('_') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let decoded = after.find('_').and_then(|end| {
            let hex = &after[..end];
            if hex.len() < 2 || hex.len() > 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .filter(|c| !c.is_control())
                .map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('_');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_style_name() {
        assert_eq!(decode_style_name("Apparatus_20_text"), "Apparatus text");
        assert_eq!(decode_style_name("Text_20_body_20_2"), "Text body 2");
        assert_eq!(decode_style_name("Comment"), "Comment");
        assert_eq!(decode_style_name("snake_case_name"), "snake_case_name");
        assert_eq!(decode_style_name("trailing_"), "trailing_");
        assert_eq!(decode_style_name("Note_0a_"), "Note_0a_");
    }

    #[test]
    fn test_text_properties() {
        let mut def = StyleDef::new("T1", StyleFamily::Text);
        def.apply_text_property("fo:font-weight", "bold");
        def.apply_text_property("fo:font-style", "italic");
        def.apply_text_property("style:text-position", "super 58%");
        def.apply_text_property("fo:letter-spacing", "0.106cm");
        assert!(def.text.bold);
        assert!(def.text.italic);
        assert!(def.text.superscript);
        assert!(def.text.spaced);

        def.apply_text_property("style:text-position", "-33% 58%");
        assert!(def.text.subscript);
        assert!(!def.text.superscript);

        def.apply_text_property("fo:letter-spacing", "normal");
        assert!(!def.text.spaced);
    }

    #[test]
    fn test_chain_and_inheritance() {
        let mut sheet = StyleSheet::new();
        let mut base = StyleDef::new("Apparatus", StyleFamily::Paragraph);
        base.apply_text_property("fo:font-style", "italic");
        sheet.define(base);

        let mut auto = StyleDef::new("P3", StyleFamily::Paragraph);
        auto.parent = Some("Apparatus".into());
        sheet.define(auto);

        assert_eq!(
            sheet.chain(StyleFamily::Paragraph, "P3"),
            vec!["P3".to_string(), "Apparatus".to_string()]
        );
        assert!(sheet.text_style(StyleFamily::Paragraph, "P3").italic);
        assert_eq!(sheet.chain(StyleFamily::Text, "P3"), vec!["P3".to_string()]);
    }

    #[test]
    fn test_cyclic_chain_terminates() {
        let mut sheet = StyleSheet::new();
        let mut a = StyleDef::new("A", StyleFamily::Paragraph);
        a.parent = Some("B".into());
        let mut b = StyleDef::new("B", StyleFamily::Paragraph);
        b.parent = Some("A".into());
        sheet.define(a);
        sheet.define(b);

        assert_eq!(sheet.chain(StyleFamily::Paragraph, "A").len(), 2);
    }
}
