//! Spreadsheet feed normalization.
//!
//! The sheet feed is delimited text, usually exported from a published
//! spreadsheet. First row is headers unless configured otherwise; fields
//! may be quoted with doubled-quote escaping; empty lines are skipped. An
//! auto-typing mode recognizes obvious numeric and boolean tokens so that
//! hand-typed `TRUE` / `42` cells behave sensibly, but record fields are
//! flattened back to strings at the end — only the shape matters here.

use crate::{set_nonempty, ExternalRecord, FeedError, FeedKind};
use regex::Regex;
use tourscout_scene::EntityType;
use tracing::{debug, warn};
use url::Url;

// ============================================================================
// Options
// ============================================================================

/// Parsing options for the sheet feed.
#[derive(Debug, Clone)]
pub struct SheetOptions {
    pub delimiter: char,
    /// First non-empty row is a header row.
    pub has_header: bool,
    /// Convert obvious numeric/boolean tokens while parsing.
    pub auto_type: bool,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            auto_type: true,
        }
    }
}

/// Column order assumed when the sheet has no header row.
const DEFAULT_COLUMNS: &[&str] = &["id", "tag", "name", "description", "imageurl", "elementtype"];

// ============================================================================
// Cell Values
// ============================================================================

/// A parsed sheet cell. Auto-typing only ever matters for presentation and
/// future typed columns; normalization flattens everything to strings.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl SheetValue {
    fn parse(token: &str, auto_type: bool) -> SheetValue {
        if auto_type {
            let trimmed = token.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                return SheetValue::Bool(true);
            }
            if trimmed.eq_ignore_ascii_case("false") {
                return SheetValue::Bool(false);
            }
            if !trimmed.is_empty() {
                if let Ok(num) = trimmed.parse::<f64>() {
                    return SheetValue::Num(num);
                }
            }
        }
        SheetValue::Str(token.to_string())
    }

    fn as_display_string(&self) -> String {
        match self {
            SheetValue::Str(s) => s.clone(),
            SheetValue::Num(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            SheetValue::Bool(b) => b.to_string(),
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalize a raw sheet body into records.
pub fn normalize_sheet(raw: &str, options: &SheetOptions) -> Result<Vec<ExternalRecord>, FeedError> {
    let mut lines = raw.lines().filter(|line| !line.trim().is_empty());

    let columns: Vec<String> = if options.has_header {
        match lines.next() {
            Some(header) => split_line(header, options.delimiter)
                .into_iter()
                .map(|c| canonical_column(&c))
                .collect(),
            None => return Ok(Vec::new()),
        }
    } else {
        DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
    };

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for (index, line) in lines.enumerate() {
        let cells = split_line(line, options.delimiter);
        let mut rec = ExternalRecord::empty(FeedKind::Sheet);

        for (column, cell) in columns.iter().zip(cells.iter()) {
            let value = SheetValue::parse(cell, options.auto_type);
            let text = value.as_display_string();
            match column.as_str() {
                "id" => set_nonempty(&mut rec.id, &text),
                "tag" | "matchtag" | "tags" => set_nonempty(&mut rec.match_tag, &text),
                "name" | "title" => set_nonempty(&mut rec.name, &text),
                "description" | "desc" => set_nonempty(&mut rec.description, &text),
                "imageurl" | "image" => set_nonempty(&mut rec.image_url, &text),
                "elementtype" | "type" => {
                    rec.declared_type = EntityType::parse_declared(&text);
                }
                other => debug!(column = other, "unmapped sheet column; ignored"),
            }
        }

        if rec.has_key() {
            records.push(rec);
        } else {
            dropped += 1;
            debug!(row = index, "sheet row has no usable key; dropped");
        }
    }

    if dropped > 0 {
        warn!(dropped, "sheet feed rows dropped for missing keys");
    }
    Ok(records)
}

/// Lowercase a header cell and strip separators so `Image URL`,
/// `image_url` and `imageUrl` all map to the same column.
fn canonical_column(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect::<String>()
        .to_lowercase()
}

/// Split one delimited line, honoring quoted fields with `""` escapes.
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

// ============================================================================
// Published-Sheet URLs
// ============================================================================

/// Rewrite a published-spreadsheet page URL to its raw delimited export
/// form. Returns `None` when the URL is not a recognized published sheet
/// (callers then fetch it as-is).
pub fn rewrite_published_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    if url.host_str() != Some("docs.google.com") {
        return None;
    }

    // Published sheets look like /spreadsheets/d/e/<key>/pubhtml; the raw
    // export swaps the terminal segment for pub?output=csv.
    let pattern = Regex::new(r"^(/spreadsheets/d/e/[^/]+)/(?:pubhtml|pub)").ok()?;
    let caps = pattern.captures(url.path())?;
    let mut rewritten = Url::parse(raw).ok()?;
    rewritten.set_path(&format!("{}/pub", &caps[1]));
    rewritten.set_query(Some("output=csv"));
    rewritten.set_fragment(None);
    Some(rewritten.to_string())
}
