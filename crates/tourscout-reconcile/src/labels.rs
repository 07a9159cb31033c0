//! Final label and subtitle resolution.
//!
//! Every corpus entry gets its display label through one fallback chain,
//! evaluated lazily because some sources are allowed to be deliberately
//! empty:
//!
//! 1. the winning external source's name, when that source is primary
//!    (or when the record is the entry's only source);
//! 2. the tour-native label;
//! 3. the tour-native subtitle, if `useSubtitleAsLabel` is on;
//! 4. the joined tag list, if `useTagsAsLabel` is on;
//! 5. `"{EntityType} {ordinal+1}"` for entities discovered in the tour;
//! 6. the configured placeholder.

use crate::config::{LabelOptions, PrimarySource, SearchConfig};
use crate::CorpusEntry;
use tourscout_feeds::FeedKind;

/// Resolved display strings for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLabel {
    pub label: String,
    pub subtitle: String,
}

/// Apply the resolution chain to every entry in place.
pub fn finalize(entries: &mut [CorpusEntry], config: &SearchConfig) {
    for entry in entries.iter_mut() {
        let resolved = resolve_label(entry, config);
        entry.label = resolved.label;
        entry.subtitle = resolved.subtitle;
    }
}

/// Compute the final label and subtitle for one entry without mutating it.
pub fn resolve_label(entry: &CorpusEntry, config: &SearchConfig) -> ResolvedLabel {
    let options = &config.labels;
    let external_wins = external_is_authoritative(entry, config);

    let record_name = entry
        .record
        .as_ref()
        .and_then(|r| r.name.as_deref())
        .filter(|n| !n.is_empty());
    let record_description = entry
        .record
        .as_ref()
        .and_then(|r| r.description.as_deref())
        .filter(|d| !d.is_empty());
    let native_label = entry
        .entity
        .as_ref()
        .map(|e| e.label.as_str())
        .filter(|l| !l.is_empty());
    let native_subtitle = entry
        .entity
        .as_ref()
        .map(|e| e.subtitle.as_str())
        .filter(|s| !s.is_empty());

    let mut subtitle_spent = false;
    let label = if external_wins && record_name.is_some() {
        record_name.unwrap_or_default().to_string()
    } else if let Some(native) = native_label {
        native.to_string()
    } else if options.use_subtitle_as_label && native_subtitle.is_some() {
        subtitle_spent = true;
        native_subtitle.unwrap_or_default().to_string()
    } else if options.use_tags_as_label && !entry.tags.is_empty() {
        entry.tags.join(", ")
    } else if let Some(entity) = entry.entity.as_ref() {
        format!("{} {}", entity.kind.display_name(), entity.ordinal + 1)
    } else {
        placeholder(options)
    };

    // Subtitle has its own, shorter chain: an authoritative external
    // description, then the native subtitle (unless the label consumed it),
    // then any external description filling the gap.
    let subtitle = if external_wins && record_description.is_some() {
        record_description.unwrap_or_default().to_string()
    } else if !subtitle_spent && native_subtitle.is_some() {
        native_subtitle.unwrap_or_default().to_string()
    } else {
        record_description.unwrap_or_default().to_string()
    };

    ResolvedLabel { label, subtitle }
}

/// External data wins when its feed is the configured primary source, or
/// when the entry has no tour-native side at all (standalone entries).
fn external_is_authoritative(entry: &CorpusEntry, config: &SearchConfig) -> bool {
    let record = match entry.record.as_ref() {
        Some(record) => record,
        None => return false,
    };
    if entry.entity.is_none() {
        return true;
    }
    matches!(
        (config.primary_source(), record.origin),
        (PrimarySource::Directory, FeedKind::Directory) | (PrimarySource::Sheet, FeedKind::Sheet)
    )
}

fn placeholder(options: &LabelOptions) -> String {
    if options.placeholder.is_empty() {
        "Untitled".to_string()
    } else {
        options.placeholder.clone()
    }
}
