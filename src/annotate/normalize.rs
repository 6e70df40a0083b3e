//! Removal of editorial control text from the stream.
//!
//! Manuscripts carry page-break tags (`<PE_12>`, `<PO_3>`), language and
//! layout tags (`<LAT>…</LAT>`), division tags, format codes and separator
//! pipes that must not reach the output as text. Rules flag the matching
//! atoms as removed and record what the tags stood for; offsets never shift.

use super::anchor::{Division, Milestone, StreamParagraph, TextStream, Wrap};
use crate::config::{NormalizationRule, RuleAction};
use crate::error::Result;
use regex::Regex;
use std::cmp::Reverse;
use std::ops::Range;

#[derive(Debug, Clone)]
enum Action {
    Remove,
    PageBreak {
        edition: Option<String>,
        inside_word: bool,
    },
    Wrap {
        close: Regex,
        wrap: Wrap,
    },
    Division(Division),
}

impl Action {
    fn compile(action: &RuleAction) -> Result<Self> {
        Ok(match action {
            RuleAction::Remove => Action::Remove,
            RuleAction::PageBreak {
                edition,
                inside_word,
            } => Action::PageBreak {
                edition: edition.clone(),
                inside_word: *inside_word,
            },
            RuleAction::Wrap {
                close,
                element,
                attributes,
            } => Action::Wrap {
                close: Regex::new(close)?,
                wrap: Wrap {
                    element: element.clone(),
                    attributes: attributes
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                },
            },
            RuleAction::Division {
                kind,
                heading,
                language,
            } => Action::Division(Division {
                kind: kind.clone(),
                heading: *heading,
                language: language.clone(),
            }),
        })
    }
}

/// Applies normalization rules, in configured order.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<(Regex, Action)>,
}

impl Normalizer {
    /// Compile the configured rules.
    pub fn new(rules: &[NormalizationRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| Ok((Regex::new(&r.pattern)?, Action::compile(&r.action)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Flag removed atoms and record milestones, wraps and divisions.
    /// Returns the number of matches.
    pub fn apply(&self, stream: &mut TextStream) -> usize {
        let mut matches = 0;
        for paragraph in &mut stream.paragraphs {
            if paragraph.atoms.is_empty() {
                continue;
            }
            let text = paragraph.raw_text();
            let starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
            let to_atom = |byte: usize| starts.partition_point(|&b| b < byte);

            for (re, action) in &self.rules {
                for caps in re.captures_iter(&text) {
                    let Some(m) = caps.get(0) else { continue };
                    if m.is_empty() {
                        continue;
                    }
                    let range = to_atom(m.start())..to_atom(m.end());
                    remove(paragraph, range.clone());
                    matches += 1;

                    match action {
                        Action::Remove => {}
                        Action::PageBreak {
                            edition,
                            inside_word,
                        } => {
                            let n = caps
                                .get(1)
                                .map(|g| g.as_str().to_string())
                                .filter(|n| !n.is_empty());
                            paragraph.milestones.push((
                                range.start,
                                Milestone {
                                    n,
                                    edition: edition.clone(),
                                    inside_word: *inside_word,
                                },
                            ));
                        }
                        Action::Wrap { close, wrap } => {
                            let end = match close.find_at(&text, m.end()).filter(|c| !c.is_empty()) {
                                Some(c) => {
                                    let tag = to_atom(c.start())..to_atom(c.end());
                                    remove(paragraph, tag.clone());
                                    tag.start
                                }
                                None => {
                                    log::debug!("unclosed <{}> runs to the paragraph end", wrap.element);
                                    paragraph.atoms.len()
                                }
                            };
                            if range.end < end {
                                paragraph.wraps.push((range.end..end, wrap.clone()));
                            }
                        }
                        Action::Division(division) => {
                            if paragraph.division.is_none() {
                                paragraph.division = Some(division.clone());
                            }
                        }
                    }
                }
            }
            paragraph.milestones.sort_by_key(|(at, _)| *at);
            paragraph
                .wraps
                .sort_by_key(|(range, _)| (range.start, Reverse(range.end)));
        }
        log::debug!("normalization matched {} times", matches);
        matches
    }
}

fn remove(paragraph: &mut StreamParagraph, range: Range<usize>) {
    for atom in &mut paragraph.atoms[range] {
        atom.kept = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::anchor::build_index;
    use crate::config::{default_normalization, DEFAULT_PAGE_EDITION};
    use crate::model::{Document, Paragraph};

    fn stream(text: &str) -> TextStream {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text(text));
        build_index(&doc).0
    }

    fn defaults(text: &str) -> StreamParagraph {
        let mut s = stream(text);
        Normalizer::new(&default_normalization())
            .unwrap()
            .apply(&mut s);
        s.paragraphs.remove(0)
    }

    #[test]
    fn test_default_rules_handle_control_text() {
        let normalizer = Normalizer::new(&default_normalization()).unwrap();
        let mut s = stream("Labyrint<PE_12> světa | a<PO_3> ráj<FO_i>");
        let n = normalizer.apply(&mut s);

        assert_eq!(n, 4);
        let p = &s.paragraphs[0];
        assert_eq!(p.kept_text(0..p.atoms.len()), "Labyrint světa a ráj");
        assert_eq!(
            p.milestones,
            vec![
                (
                    8,
                    Milestone {
                        n: Some("12".into()),
                        edition: Some(DEFAULT_PAGE_EDITION.into()),
                        inside_word: false,
                    }
                ),
                (
                    25,
                    Milestone {
                        n: Some("3".into()),
                        edition: None,
                        inside_word: true,
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_page_tag_takes_leading_pipe() {
        let p = defaults("konec| <PE_7>začátek <PO>dál");
        assert_eq!(p.kept_text(0..p.atoms.len()), "koneczačátek dál");
        assert_eq!(p.milestones[0].0, 5);
        assert_eq!(p.milestones[1].1.n, None);
    }

    #[test]
    fn test_offsets_do_not_shift() {
        let normalizer = Normalizer::new(&default_normalization()).unwrap();
        let mut s = stream("ab<PE_1>cd");
        let before = s.paragraphs[0].atoms.len();
        normalizer.apply(&mut s);
        assert_eq!(s.paragraphs[0].atoms.len(), before);
        assert!(!s.paragraphs[0].atoms[7].kept);
        assert!(s.paragraphs[0].atoms[8].kept);
    }

    #[test]
    fn test_page_break_rule() {
        let rules = vec![NormalizationRule::page_break(
            r"<PB_(\d+)>",
            Some("DJAK03".to_string()),
        )];
        let normalizer = Normalizer::new(&rules).unwrap();
        let mut s = stream("konec<PB_7>začátek");
        normalizer.apply(&mut s);

        let p = &s.paragraphs[0];
        assert_eq!(p.kept_text(0..p.atoms.len()), "koneczačátek");
        assert_eq!(p.milestones.len(), 1);
        assert_eq!(p.milestones[0].0, 5);
        assert_eq!(p.milestones[0].1.n.as_deref(), Some("7"));
        assert_eq!(p.milestones[0].1.edition.as_deref(), Some("DJAK03"));
    }

    #[test]
    fn test_wrap_tags() {
        let p = defaults("dixit <LAT>verbum <M>dei</M></LAT> ráj");
        assert_eq!(p.kept_text(0..p.atoms.len()), "dixit verbum dei ráj");
        assert_eq!(p.wraps.len(), 2);

        let (outer, lat) = &p.wraps[0];
        assert_eq!(outer, &(11..28));
        assert_eq!(lat.element, "foreign");
        assert_eq!(lat.attributes, vec![("xml:lang".to_string(), "la".to_string())]);

        let (inner, add) = &p.wraps[1];
        assert_eq!(p.kept_text(inner.clone()), "dei");
        assert_eq!(add.element, "add");
        assert_eq!(p.wraps_at(22), vec![0, 1]);
        assert_eq!(p.wraps_at(12), vec![0]);
    }

    #[test]
    fn test_unclosed_wrap_runs_to_paragraph_end() {
        let p = defaults("slovo <REND_SP>proložené písmo");
        assert_eq!(p.wraps.len(), 1);
        assert_eq!(p.wraps[0].0, 15..p.atoms.len());
        assert_eq!(p.wraps[0].1.attributes[0].1, "spaced");
    }

    #[test]
    fn test_division_tags() {
        let p = defaults("<CHAPTER>Kapitola I.");
        assert_eq!(p.kept_text(0..p.atoms.len()), "Kapitola I.");
        let division = p.division.unwrap();
        assert_eq!(division.kind.as_deref(), Some("chapter"));
        assert!(division.heading);

        let p = defaults("<PREFACE_1_LAT>");
        assert!(p.is_blank());
        let division = p.division.unwrap();
        assert_eq!(division.kind.as_deref(), Some("preface"));
        assert_eq!(division.language.as_deref(), Some("la"));

        let p = defaults("<TEXT_NO_HEAD>text");
        assert_eq!(p.division, Some(Division::default()));
    }

    #[test]
    fn test_invalid_rule() {
        assert!(Normalizer::new(&[NormalizationRule::remove("(")]).is_err());
        let rule = NormalizationRule::wrap("<X>", "(", "hi", [("rend", "x")]);
        assert!(Normalizer::new(&[rule]).is_err());
    }
}
