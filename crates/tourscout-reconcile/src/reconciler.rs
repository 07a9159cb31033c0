//! Corpus assembly: filter, merge, standalone creation, dedup.
//!
//! Order matters and is part of the contract:
//!
//! 1. inclusion filters drop entities and standalone records before
//!    anything reaches the corpus;
//! 2. matched `(entity, record)` pairs merge into one entry each;
//! 3. unmatched records become standalone entries when enabled;
//! 4. labels are finalized, then a label/id dedup sweep keeps only the
//!    first of any colliding pair, logging the collision.

use crate::context::{DiagnosticKind, IndexBuildContext};
use crate::{labels, matcher, CorpusEntry, Provenance};
use std::collections::{HashMap, HashSet};
use tourscout_feeds::ExternalRecord;
use tourscout_scene::{EntityType, RawEntity};
use tracing::debug;

/// Run the full reconciliation pass over already-materialized inputs.
///
/// Purely synchronous; feed fetching and settling happen before this is
/// called. The returned entries are finalized and deduplicated, ready for
/// the index builder.
pub fn build_corpus(
    entities: &[RawEntity],
    records: &[ExternalRecord],
    ctx: &mut IndexBuildContext,
) -> Vec<CorpusEntry> {
    let matches = matcher::match_records(records, entities, ctx);
    let record_for_entity = matches.record_for_entity();

    let mut entries: Vec<CorpusEntry> = Vec::with_capacity(entities.len());
    // Entity index behind each entry, for parent-label wiring below.
    let mut entity_of_entry: Vec<Option<usize>> = Vec::with_capacity(entities.len());

    for (entity_idx, entity) in entities.iter().enumerate() {
        if let Some(reason) = ctx.config.filters.reject_entity(entity) {
            debug!(
                entity = entity.native_id.as_deref().unwrap_or("?"),
                reason, "entity filtered out"
            );
            continue;
        }
        let record = record_for_entity
            .get(&entity_idx)
            .map(|rec_idx| records[*rec_idx].clone());
        entries.push(merged_entry(entity, record, entities));
        entity_of_entry.push(Some(entity_idx));
    }

    if ctx.config.standalone_entries {
        for (offset, rec_idx) in matches.standalone.iter().enumerate() {
            let record = &records[*rec_idx];
            let name = record.name.as_deref().unwrap_or("");
            let tags: Vec<String> = record.all_tags().map(str::to_string).collect();
            if let Some(reason) =
                ctx.config
                    .filters
                    .reject_standalone(name, record.declared_type, &tags)
            {
                debug!(record = name, reason, "standalone record filtered out");
                continue;
            }
            entries.push(standalone_entry(record.clone(), entities.len() + offset));
            entity_of_entry.push(None);
        }
    } else if !matches.standalone.is_empty() {
        debug!(
            count = matches.standalone.len(),
            "standalone entries disabled; unmatched records dropped"
        );
    }

    labels::finalize(&mut entries, &ctx.config);
    wire_parent_labels(&mut entries, &entity_of_entry, entities);
    dedup(entries, ctx)
}

/// Merge one entity with its matched record, if any. Labels stay native
/// here; the resolver decides the final display strings.
fn merged_entry(
    entity: &RawEntity,
    record: Option<ExternalRecord>,
    entities: &[RawEntity],
) -> CorpusEntry {
    let mut origin = Provenance::tour_only();
    let mut tags = entity.tags.clone();
    let mut image_url = None;

    if let Some(record) = record.as_ref() {
        origin = origin.with_feed(record.origin);
        image_url = record.image_url.clone();
        for tag in record.all_tags() {
            if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                tags.push(tag.to_string());
            }
        }
    }

    let parent_sort_key = entity.parent.map(|p| entities[p].ordinal);

    CorpusEntry {
        kind: entity.kind,
        label: entity.label.clone(),
        subtitle: entity.subtitle.clone(),
        tags,
        image_url,
        boost: 1.0,
        sort_key: entity.ordinal,
        parent_label: None,
        parent_sort_key,
        origin,
        entity: Some(entity.clone()),
        record,
    }
}

/// An entry derived from an external record with no matching scene entity.
fn standalone_entry(record: ExternalRecord, sort_key: usize) -> CorpusEntry {
    CorpusEntry {
        kind: record.declared_type.unwrap_or(EntityType::Element),
        label: String::new(),
        subtitle: String::new(),
        tags: record.all_tags().map(str::to_string).collect(),
        image_url: record.image_url.clone(),
        boost: 1.0,
        sort_key,
        parent_label: None,
        parent_sort_key: None,
        origin: Provenance::default().with_feed(record.origin),
        entity: None,
        record: Some(record),
    }
}

/// Give child entries their parent's resolved label so results can show
/// "Front desk — Lobby" and the dedup sweep can tell twins apart by
/// context. Parents filtered out of the corpus fall back to their native
/// label.
fn wire_parent_labels(
    entries: &mut [CorpusEntry],
    entity_of_entry: &[Option<usize>],
    entities: &[RawEntity],
) {
    let corpus_of_entity: HashMap<usize, usize> = entity_of_entry
        .iter()
        .enumerate()
        .filter_map(|(corpus_idx, entity_idx)| entity_idx.map(|e| (e, corpus_idx)))
        .collect();

    for corpus_idx in 0..entries.len() {
        let parent_entity = entity_of_entry[corpus_idx]
            .and_then(|e| entities[e].parent);
        let Some(parent_idx) = parent_entity else {
            continue;
        };
        let label = match corpus_of_entity.get(&parent_idx) {
            Some(parent_corpus) => entries[*parent_corpus].label.clone(),
            None => entities[parent_idx].label.clone(),
        };
        if !label.is_empty() {
            entries[corpus_idx].parent_label = Some(label);
        }
    }
}

/// Final dedup sweep. Two entries collide when they share a native id, or
/// when they share a case-insensitive label, the same resolved type, and
/// indistinguishable parent context. First by discovery order wins; the
/// loser is logged, never silently doubled in the index.
fn dedup(entries: Vec<CorpusEntry>, ctx: &mut IndexBuildContext) -> Vec<CorpusEntry> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_labels: HashSet<(String, EntityType, Option<String>)> = HashSet::new();
    let mut kept = Vec::with_capacity(entries.len());

    for entry in entries {
        if let Some(id) = entry.native_id() {
            if !seen_ids.insert(id.to_lowercase()) {
                ctx.warn(
                    DiagnosticKind::DuplicateEntry,
                    format!("duplicate native id \"{id}\"; keeping the first entry"),
                );
                continue;
            }
        }

        let key = (
            entry.label.to_lowercase(),
            entry.kind,
            entry.parent_label.as_ref().map(|p| p.to_lowercase()),
        );
        if !seen_labels.insert(key) {
            ctx.warn(
                DiagnosticKind::DuplicateEntry,
                format!(
                    "duplicate label \"{}\" ({}); keeping the first entry",
                    entry.label, entry.kind
                ),
            );
            continue;
        }

        kept.push(entry);
    }

    kept
}
