//! Directory feed normalization.
//!
//! The directory feed is a JSON array of hand-maintained records:
//!
//! ```json
//! [{"id": "rm001", "tag": "lobby", "name": "Main Lobby",
//!   "description": "...", "imageUrl": "...", "elementType": "scene"}]
//! ```
//!
//! Rows are loosely typed (ids show up as numbers, tags as scalars or
//! arrays), so every field goes through tolerant extraction. Malformed rows
//! are skipped with a warning rather than failing the feed.

use crate::{set_nonempty, ExternalRecord, FeedError, FeedKind};
use serde_json::Value;
use tourscout_scene::EntityType;
use tracing::{debug, warn};

/// Normalize a raw directory feed body into records.
///
/// Keyless rows (no id, tag, or name) are dropped here, per the feed
/// contract.
pub fn normalize_directory(raw: &str) -> Result<Vec<ExternalRecord>, FeedError> {
    let value: Value = serde_json::from_str(raw)?;
    let rows = match value {
        Value::Array(rows) => rows,
        other => {
            return Err(FeedError::UnexpectedShape(
                json_type_name(&other),
            ))
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for (index, row) in rows.iter().enumerate() {
        let obj = match row.as_object() {
            Some(obj) => obj,
            None => {
                warn!(index, "directory row is not an object; skipping");
                continue;
            }
        };

        let mut rec = ExternalRecord::empty(FeedKind::Directory);
        if let Some(id) = scalar_string(obj.get("id")) {
            set_nonempty(&mut rec.id, &id);
        }
        extract_tags(obj, &mut rec);
        if let Some(name) = scalar_string(obj.get("name")) {
            set_nonempty(&mut rec.name, &name);
        }
        if let Some(desc) = scalar_string(obj.get("description")) {
            set_nonempty(&mut rec.description, &desc);
        }
        if let Some(url) = scalar_string(obj.get("imageUrl")) {
            set_nonempty(&mut rec.image_url, &url);
        }
        rec.declared_type = obj
            .get("elementType")
            .and_then(Value::as_str)
            .and_then(EntityType::parse_declared);

        if rec.has_key() {
            records.push(rec);
        } else {
            dropped += 1;
            debug!(index, "directory row has no usable key; dropped");
        }
    }

    if dropped > 0 {
        warn!(dropped, "directory feed rows dropped for missing keys");
    }
    Ok(records)
}

/// Tags come either as a scalar `tag` or a `matchTags` array; the first
/// usable tag becomes the primary and the rest stay available for matching.
fn extract_tags(obj: &serde_json::Map<String, Value>, rec: &mut ExternalRecord) {
    if let Some(tag) = scalar_string(obj.get("tag")) {
        set_nonempty(&mut rec.match_tag, &tag);
    }
    if let Some(tags) = obj.get("matchTags").and_then(Value::as_array) {
        for tag in tags.iter().filter_map(|t| scalar_string(Some(t))) {
            let trimmed = tag.trim();
            if trimmed.is_empty() {
                continue;
            }
            if rec.match_tag.is_none() {
                rec.match_tag = Some(trimmed.to_string());
            } else if rec.match_tag.as_deref() != Some(trimmed) {
                rec.extra_tags.push(trimmed.to_string());
            }
        }
    }
}

/// Accept strings and numbers where a string is expected; feeds written by
/// hand use them interchangeably.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
