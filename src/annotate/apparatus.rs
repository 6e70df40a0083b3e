//! Critical-apparatus entry parser.
//!
//! Entries are written by editors in a compact notation:
//!
//! ```text
//! — 12 cnost] ctnost W, St; om. B (srov. v. 14)
//! ```
//!
//! that is an optional number, the lemma, a `]` delimiter, one or more
//! reading clauses separated by `;`, each attributed to sigla, and an
//! optional parenthesized note at the very end. Parsing is a tokenizer
//! followed by a small recursive-descent parser over the token stream.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{ApparatusEntry, Reading};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Why an apparatus entry failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrammarError {
    /// Nothing but whitespace and dashes
    #[error("empty entry")]
    Empty,

    /// A `)` without a matching `(`
    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,

    /// A `(` that is never closed
    #[error("unterminated note")]
    UnterminatedNote,

    /// No `]` between lemma and readings
    #[error("missing lemma delimiter ']'")]
    MissingLemmaDelimiter,

    /// More than one `]`
    #[error("more than one lemma delimiter ']'")]
    MultipleLemmaDelimiters,

    /// Nothing before `]`
    #[error("missing lemma")]
    MissingLemma,

    /// Nothing after `]`
    #[error("missing reading")]
    MissingReading,

    /// Two adjacent `;` or a `;` at the end
    #[error("empty reading clause {clause}")]
    EmptyReadingClause {
        /// 1-based clause number
        clause: usize,
    },

    /// A clause whose words include no siglum
    #[error("reading without siglum in clause {clause}")]
    ReadingWithoutSiglum {
        /// 1-based clause number
        clause: usize,
    },

    /// A clause made of sigla only
    #[error("reading without text in clause {clause}")]
    ReadingWithoutText {
        /// 1-based clause number
        clause: usize,
    },
}

/// Lexical token of an apparatus entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A whitespace-delimited word
    Word(String),
    /// `]`
    Bracket,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// Parenthesized text, without the parentheses
    Group(String),
}

/// Split an entry into tokens.
pub fn tokenize(input: &str) -> std::result::Result<Vec<Token>, GrammarError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = input.chars();

    fn flush(word: &mut String, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            ']' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Bracket);
            }
            ';' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Semicolon);
            }
            ',' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Comma);
            }
            '(' => {
                flush(&mut word, &mut tokens);
                let mut depth = 1;
                let mut group = String::new();
                loop {
                    match chars.next() {
                        Some('(') => {
                            depth += 1;
                            group.push('(');
                        }
                        Some(')') => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            group.push(')');
                        }
                        Some(other) => group.push(other),
                        None => return Err(GrammarError::UnterminatedNote),
                    }
                }
                tokens.push(Token::Group(group.trim().to_string()));
            }
            ')' => return Err(GrammarError::UnbalancedParenthesis),
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

fn is_dash(token: &Token) -> bool {
    matches!(token, Token::Word(w) if w.chars().all(|c| matches!(c, '—' | '–' | '-' | '‒' | '―')))
}

/// Recognizes sigla and maps them to canonical witness ids.
#[derive(Debug, Clone)]
pub struct SiglumMatcher {
    witnesses: BTreeMap<String, String>,
    pattern: Option<Regex>,
}

impl SiglumMatcher {
    /// Build a matcher from the configured witness map or siglum pattern.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let pattern = if config.witnesses.is_empty() {
            Some(Regex::new(&config.siglum_pattern)?)
        } else {
            None
        };
        Ok(Self {
            witnesses: config.witnesses.clone(),
            pattern,
        })
    }

    /// Canonical witness id of a word, if it is a siglum.
    pub fn canonical(&self, word: &str) -> Option<String> {
        match &self.pattern {
            Some(re) => re.is_match(word).then(|| word.to_string()),
            None => self.witnesses.get(word).cloned(),
        }
    }
}

/// Parser for apparatus entries.
#[derive(Debug, Clone)]
pub struct ApparatusParser {
    sigla: SiglumMatcher,
    conjunctions: Vec<String>,
    omission_markers: Vec<String>,
    base_witness: Option<String>,
}

impl ApparatusParser {
    /// Build a parser from the engine configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            sigla: SiglumMatcher::new(config)?,
            conjunctions: config.conjunctions.clone(),
            omission_markers: config.omission_markers.clone(),
            base_witness: config.base_witness.clone(),
        })
    }

    /// Parse an entry. A failure never yields a partial entry.
    pub fn parse(&self, raw: &str) -> std::result::Result<ApparatusEntry, GrammarError> {
        let mut tokens = tokenize(raw)?;
        strip_dashes(&mut tokens);

        let note = match tokens.last() {
            Some(Token::Group(text)) => {
                let note = text.clone();
                tokens.pop();
                strip_dashes(&mut tokens);
                Some(note)
            }
            _ => None,
        };
        if tokens.is_empty() {
            return Err(if note.is_some() {
                GrammarError::MissingLemmaDelimiter
            } else {
                GrammarError::Empty
            });
        }

        let number = match tokens.first() {
            Some(Token::Word(w)) => parse_number(w),
            _ => None,
        };
        if number.is_some() {
            tokens.remove(0);
        }

        let brackets: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == Token::Bracket)
            .map(|(i, _)| i)
            .collect();
        let split = match brackets.as_slice() {
            [] => return Err(GrammarError::MissingLemmaDelimiter),
            [one] => *one,
            _ => return Err(GrammarError::MultipleLemmaDelimiters),
        };

        let (lemma_tokens, rest) = tokens.split_at(split);
        let rest = &rest[1..];

        let (lemma, mut lemma_sigla) = self.lemma(lemma_tokens)?;
        if lemma_sigla.is_empty() {
            if let Some(base) = &self.base_witness {
                lemma_sigla.push(base.clone());
            }
        }

        if rest.is_empty() {
            return Err(GrammarError::MissingReading);
        }
        let readings = rest
            .split(|t| *t == Token::Semicolon)
            .enumerate()
            .map(|(i, clause)| self.clause(clause, i + 1))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let sigla: BTreeSet<String> = lemma_sigla
            .iter()
            .chain(readings.iter().flat_map(|r| r.sigla.iter()))
            .cloned()
            .collect();

        Ok(ApparatusEntry {
            number,
            lemma,
            lemma_sigla,
            sigla,
            readings,
            note,
        })
    }

    fn lemma(&self, tokens: &[Token]) -> std::result::Result<(String, Vec<String>), GrammarError> {
        let (split, sigla) = self.trailing_sigla(tokens);
        let (text_tokens, sigla) = if split > 0 && !sigla.is_empty() {
            (&tokens[..split], sigla)
        } else {
            (tokens, Vec::new())
        };
        let lemma = join_tokens(text_tokens);
        if lemma.is_empty() {
            return Err(GrammarError::MissingLemma);
        }
        Ok((lemma, sigla))
    }

    fn clause(&self, tokens: &[Token], index: usize) -> std::result::Result<Reading, GrammarError> {
        if tokens.is_empty() {
            return Err(GrammarError::EmptyReadingClause { clause: index });
        }

        let (split, trailing) = self.trailing_sigla(tokens);
        if !trailing.is_empty() && split > 0 {
            return Ok(self.reading(&tokens[..split], trailing));
        }

        let (split, leading) = self.leading_sigla(tokens);
        if !leading.is_empty() && split < tokens.len() {
            return Ok(self.reading(&tokens[split..], leading));
        }

        if !trailing.is_empty() {
            Err(GrammarError::ReadingWithoutText { clause: index })
        } else {
            Err(GrammarError::ReadingWithoutSiglum { clause: index })
        }
    }

    fn reading(&self, tokens: &[Token], sigla: Vec<String>) -> Reading {
        let text = join_tokens(tokens);
        if self.omission_markers.iter().any(|m| *m == text) {
            return Reading::omission(sigla);
        }
        let text = text
            .trim_end_matches(|c: char| matches!(c, ',' | ':' | ';'))
            .trim_end()
            .to_string();
        Reading::new(text, sigla)
    }

    fn siglum(&self, token: &Token) -> Option<String> {
        match token {
            Token::Word(w) => self.sigla.canonical(w),
            _ => None,
        }
    }

    fn is_separator(&self, token: &Token) -> bool {
        match token {
            Token::Comma => true,
            Token::Word(w) => self.conjunctions.iter().any(|c| c == w),
            _ => false,
        }
    }

    /// Longest `siglum (sep siglum)*` run at the end of `tokens`.
    ///
    /// Returns the index where the run starts and the canonical ids in
    /// written order.
    fn trailing_sigla(&self, tokens: &[Token]) -> (usize, Vec<String>) {
        let mut sigla = Vec::new();
        let mut start = tokens.len();
        let mut i = tokens.len();

        while i > 0 {
            match self.siglum(&tokens[i - 1]) {
                Some(id) => {
                    sigla.push(id);
                    i -= 1;
                    start = i;
                }
                None => break,
            }
            if i >= 2 && self.is_separator(&tokens[i - 1]) && self.siglum(&tokens[i - 2]).is_some()
            {
                i -= 1;
            } else {
                break;
            }
        }

        sigla.reverse();
        (start, sigla)
    }

    /// Longest `siglum (sep siglum)*` run at the start of `tokens`.
    ///
    /// Returns the index just after the run and the canonical ids.
    fn leading_sigla(&self, tokens: &[Token]) -> (usize, Vec<String>) {
        let mut sigla = Vec::new();
        let mut end = 0;
        let mut i = 0;

        while i < tokens.len() {
            match self.siglum(&tokens[i]) {
                Some(id) => {
                    sigla.push(id);
                    i += 1;
                    end = i;
                }
                None => break,
            }
            if i + 1 < tokens.len()
                && self.is_separator(&tokens[i])
                && self.siglum(&tokens[i + 1]).is_some()
            {
                i += 1;
            } else {
                break;
            }
        }

        (end, sigla)
    }
}

fn strip_dashes(tokens: &mut Vec<Token>) {
    while tokens.first().map(is_dash).unwrap_or(false) {
        tokens.remove(0);
    }
    while tokens.last().map(is_dash).unwrap_or(false) {
        tokens.pop();
    }
}

fn parse_number(word: &str) -> Option<u32> {
    let digits = word.strip_suffix('.').unwrap_or(word);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Rebuild text from tokens: words space-separated, commas attached.
fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Word(w) => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(w);
            }
            Token::Comma => out.push(','),
            Token::Semicolon => out.push(';'),
            Token::Bracket => out.push(']'),
            Token::Group(g) => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push('(');
                out.push_str(g);
                out.push(')');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ApparatusParser {
        ApparatusParser::new(&EngineConfig::default()).unwrap()
    }

    // ==================== Tokenizer Tests ====================

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("cnost] ctnost W, St; om. B (viz 14)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("cnost".into()),
                Token::Bracket,
                Token::Word("ctnost".into()),
                Token::Word("W".into()),
                Token::Comma,
                Token::Word("St".into()),
                Token::Semicolon,
                Token::Word("om.".into()),
                Token::Word("B".into()),
                Token::Group("viz 14".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_parentheses() {
        assert_eq!(tokenize("a) b"), Err(GrammarError::UnbalancedParenthesis));
        assert_eq!(tokenize("a (b"), Err(GrammarError::UnterminatedNote));
        assert_eq!(
            tokenize("(a (b) c)").unwrap(),
            vec![Token::Group("a (b) c".into())]
        );
    }

    // ==================== Entry Tests ====================

    #[test]
    fn test_simple_entry() {
        let entry = parser().parse("— 5 cnost] cnosti St").unwrap();
        assert_eq!(entry.number, Some(5));
        assert_eq!(entry.lemma, "cnost");
        assert!(entry.lemma_sigla.is_empty());
        assert_eq!(entry.readings, vec![Reading::new("cnosti", vec!["St".into()])]);
        assert!(entry.sigla.contains("St"));
        assert_eq!(entry.note, None);
    }

    #[test]
    fn test_multiple_clauses_and_note() {
        let entry = parser()
            .parse("světa W] světě St a Sr; om. B (srov. výše)")
            .unwrap();
        assert_eq!(entry.lemma, "světa");
        assert_eq!(entry.lemma_sigla, vec!["W".to_string()]);
        assert_eq!(entry.readings.len(), 2);
        assert_eq!(entry.readings[0].text, "světě");
        assert_eq!(entry.readings[0].sigla, vec!["St".to_string(), "Sr".to_string()]);
        assert!(entry.readings[1].omission);
        assert_eq!(entry.readings[1].sigla, vec!["B".to_string()]);
        assert_eq!(entry.note.as_deref(), Some("srov. výše"));
        assert_eq!(entry.sigla.len(), 4);
    }

    #[test]
    fn test_leading_sigla_clause() {
        let entry = parser().parse("a to] St, Sr a tak").unwrap();
        assert_eq!(entry.readings[0].text, "a tak");
        assert_eq!(entry.readings[0].sigla, vec!["St".to_string(), "Sr".to_string()]);
    }

    #[test]
    fn test_trailing_comma_trimmed_from_reading() {
        let entry = parser().parse("x] y, St").unwrap();
        assert_eq!(entry.readings[0].text, "y");
    }

    #[test]
    fn test_witness_map() {
        let config = EngineConfig::new()
            .with_witness("A", "T1663")
            .with_witness("V", "W")
            .with_base_witness("DJAK03");
        let parser = ApparatusParser::new(&config).unwrap();
        let entry = parser.parse("slovo] slova A, V").unwrap();
        assert_eq!(entry.lemma_sigla, vec!["DJAK03".to_string()]);
        assert_eq!(entry.readings[0].sigla, vec!["T1663".to_string(), "W".to_string()]);

        // Not in the map, so not a siglum.
        assert_eq!(
            parser.parse("slovo] slova St"),
            Err(GrammarError::ReadingWithoutSiglum { clause: 1 })
        );
    }

    // ==================== Grammar Error Tests ====================

    #[test]
    fn test_grammar_errors() {
        let p = parser();
        assert_eq!(p.parse("  — "), Err(GrammarError::Empty));
        assert_eq!(p.parse("cnost cnosti St"), Err(GrammarError::MissingLemmaDelimiter));
        assert_eq!(p.parse("a] b] c St"), Err(GrammarError::MultipleLemmaDelimiters));
        assert_eq!(p.parse("] cnosti St"), Err(GrammarError::MissingLemma));
        assert_eq!(p.parse("cnost]"), Err(GrammarError::MissingReading));
        assert_eq!(
            p.parse("cnost] a St;; b W"),
            Err(GrammarError::EmptyReadingClause { clause: 2 })
        );
        assert_eq!(
            p.parse("cnost] cnosti"),
            Err(GrammarError::ReadingWithoutSiglum { clause: 1 })
        );
        assert_eq!(
            p.parse("cnost] St"),
            Err(GrammarError::ReadingWithoutText { clause: 1 })
        );
        assert_eq!(p.parse("cnost] (x"), Err(GrammarError::UnterminatedNote));
    }

    #[test]
    fn test_error_messages_are_stable() {
        assert_eq!(
            GrammarError::MissingLemmaDelimiter.to_string(),
            "missing lemma delimiter ']'"
        );
        assert_eq!(
            GrammarError::ReadingWithoutSiglum { clause: 2 }.to_string(),
            "reading without siglum in clause 2"
        );
    }
}
