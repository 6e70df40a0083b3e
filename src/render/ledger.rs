//! Plain-text ledger files.
//!
//! One record per line, fields separated by tabs. Backslashes, tabs and line
//! breaks inside fields are escaped so every record stays on its line.

use crate::annotate::{AnchorOffset, Ledger};

/// Escape a field for a tab-separated record.
pub fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn record(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join("\t");
    line.push('\n');
    line
}

fn location(at: &Option<AnchorOffset>) -> String {
    at.map(|o| o.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Lost comments: `id  location  reason  author  date  raw`.
pub fn lost_comments(ledger: &Ledger) -> String {
    ledger
        .lost_comments
        .iter()
        .map(|r| {
            record(&[
                r.id.to_string(),
                location(&r.location),
                r.reason.to_string(),
                r.author.clone().unwrap_or_else(|| "-".to_string()),
                r.date
                    .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                r.raw_text.clone(),
            ])
        })
        .collect()
}

/// Lost apparatus: `id  location  reason  lemma  sigla  raw  fragment`.
pub fn lost_apparatus(ledger: &Ledger) -> String {
    ledger
        .lost_apparatus
        .iter()
        .map(|r| {
            record(&[
                r.id.to_string(),
                location(&r.location),
                r.reason.to_string(),
                r.lemma.clone(),
                r.sigla.join(" "),
                r.raw_text.clone(),
                r.fragment.clone(),
            ])
        })
        .collect()
}

/// Problematic annotations: `id  style  reason  raw`.
pub fn problematic(ledger: &Ledger) -> String {
    ledger
        .problematic
        .iter()
        .map(|r| {
            record(&[
                r.id.to_string(),
                r.style.clone(),
                r.reason.to_string(),
                r.raw_text.clone(),
            ])
        })
        .collect()
}
