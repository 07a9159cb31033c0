//! Record-to-entity matching.
//!
//! Each external record is matched against the walked entity table through
//! ranked rules, each carrying a fixed confidence weight:
//!
//! | rule                                        | weight |
//! |---------------------------------------------|--------|
//! | exact id equality                           | 3      |
//! | tag in entity tag set, or tag == native id  | 2      |
//! | case-insensitive label/name equality        | 1      |
//!
//! Ambiguity between candidates of equal weight is broken by declared-type
//! agreement, then by the longer entity description, then by discovery
//! order with a logged warning. That last step is a documented-lossy
//! fallback, kept deliberately; see the pipeline tests that pin it.
//!
//! Consumed-key sets on the build context guarantee a record is merged at
//! most once per build, and a second record keyed to an already-consumed
//! id or tag is skipped outright rather than becoming a duplicate entry.

use crate::context::{DiagnosticKind, IndexBuildContext};
use std::collections::{HashMap, HashSet};
use tourscout_feeds::ExternalRecord;
use tourscout_scene::RawEntity;
use tracing::debug;

/// Fixed confidence weight of a match rule. Ordering is the rule ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchConfidence {
    Label = 1,
    Tag = 2,
    Id = 3,
}

/// One entity that a record could merge into.
#[derive(Debug, Clone, Copy)]
pub struct MatchCandidate {
    pub entity: usize,
    pub confidence: MatchConfidence,
}

/// Outcome of matching every record of a build.
#[derive(Debug, Default)]
pub struct MatchResult {
    /// `(record index, entity index)` pairs to merge.
    pub pairs: Vec<(usize, usize)>,
    /// Records that matched nothing; standalone-entry candidates.
    pub standalone: Vec<usize>,
}

impl MatchResult {
    /// Entity index → record index lookup for the merge pass.
    pub fn record_for_entity(&self) -> HashMap<usize, usize> {
        self.pairs.iter().map(|(rec, ent)| (*ent, *rec)).collect()
    }
}

/// Match all records against the entity table, in feed order.
pub fn match_records(
    records: &[ExternalRecord],
    entities: &[RawEntity],
    ctx: &mut IndexBuildContext,
) -> MatchResult {
    let mut result = MatchResult::default();
    let mut matched_entities: HashSet<usize> = HashSet::new();

    for (rec_idx, record) in records.iter().enumerate() {
        if already_consumed(record, ctx) {
            ctx.warn(
                DiagnosticKind::DuplicateEntry,
                format!(
                    "record {} skipped: key already consumed by an earlier match",
                    describe_record(record)
                ),
            );
            continue;
        }

        let mut candidates = find_candidates(record, entities);
        candidates.retain(|c| !matched_entities.contains(&c.entity));

        let chosen = match candidates.len() {
            0 => None,
            1 => Some(candidates[0]),
            _ => Some(resolve_ambiguity(record, entities, &candidates, ctx)),
        };

        match chosen {
            Some(candidate) => {
                matched_entities.insert(candidate.entity);
                consume_keys(record, ctx);
                debug!(
                    record = describe_record(record),
                    entity = candidate.entity,
                    confidence = ?candidate.confidence,
                    "record matched"
                );
                result.pairs.push((rec_idx, candidate.entity));
            }
            None => result.standalone.push(rec_idx),
        }
    }

    result
}

/// All entities a record could merge into, one candidate per entity at its
/// best confidence, in discovery order.
pub fn find_candidates(record: &ExternalRecord, entities: &[RawEntity]) -> Vec<MatchCandidate> {
    let mut candidates = Vec::new();
    for (index, entity) in entities.iter().enumerate() {
        if let Some(confidence) = confidence_for(record, entity) {
            candidates.push(MatchCandidate {
                entity: index,
                confidence,
            });
        }
    }
    candidates
}

fn confidence_for(record: &ExternalRecord, entity: &RawEntity) -> Option<MatchConfidence> {
    if let (Some(id), Some(native)) = (record.id.as_deref(), entity.native_id.as_deref()) {
        if id == native {
            return Some(MatchConfidence::Id);
        }
    }

    for tag in record.all_tags() {
        if entity.has_tag(tag) || entity.id_is(tag) {
            return Some(MatchConfidence::Tag);
        }
    }

    if let Some(name) = record.name.as_deref() {
        if !entity.label.is_empty() && entity.label.eq_ignore_ascii_case(name) {
            return Some(MatchConfidence::Label);
        }
    }

    None
}

/// Resolve a multi-candidate match: highest confidence, then declared-type
/// agreement, then the longer entity description, then first-encountered
/// with a warning naming the competitors.
fn resolve_ambiguity(
    record: &ExternalRecord,
    entities: &[RawEntity],
    candidates: &[MatchCandidate],
    ctx: &mut IndexBuildContext,
) -> MatchCandidate {
    let top = candidates
        .iter()
        .map(|c| c.confidence)
        .max()
        .unwrap_or(MatchConfidence::Label);
    let mut tied: Vec<MatchCandidate> = candidates
        .iter()
        .copied()
        .filter(|c| c.confidence == top)
        .collect();

    if tied.len() > 1 {
        if let Some(declared) = record.declared_type {
            let agreeing: Vec<MatchCandidate> = tied
                .iter()
                .copied()
                .filter(|c| entities[c.entity].kind == declared)
                .collect();
            if !agreeing.is_empty() {
                tied = agreeing;
            }
        }
    }

    if tied.len() > 1 {
        let best_len = tied
            .iter()
            .map(|c| entities[c.entity].subtitle.len())
            .max()
            .unwrap_or(0);
        tied.retain(|c| entities[c.entity].subtitle.len() == best_len);
    }

    if tied.len() > 1 {
        let competitors: Vec<String> = tied
            .iter()
            .map(|c| describe_entity(&entities[c.entity], c.entity))
            .collect();
        ctx.warn(
            DiagnosticKind::AmbiguousMatch,
            format!(
                "record {} matches {} entities ({}); keeping the first",
                describe_record(record),
                tied.len(),
                competitors.join(", ")
            ),
        );
    }

    tied[0]
}

fn already_consumed(record: &ExternalRecord, ctx: &IndexBuildContext) -> bool {
    if let Some(id) = record.id.as_deref() {
        if ctx.id_consumed(id) {
            return true;
        }
    }
    record.all_tags().any(|tag| ctx.tag_consumed(tag))
}

fn consume_keys(record: &ExternalRecord, ctx: &mut IndexBuildContext) {
    if let Some(id) = record.id.as_deref() {
        ctx.consume_id(id);
    }
    let tags: Vec<String> = record.all_tags().map(str::to_string).collect();
    for tag in tags {
        ctx.consume_tag(&tag);
    }
}

fn describe_record(record: &ExternalRecord) -> String {
    record
        .id
        .as_deref()
        .or(record.match_tag.as_deref())
        .or(record.name.as_deref())
        .unwrap_or("<keyless>")
        .to_string()
}

fn describe_entity(entity: &RawEntity, index: usize) -> String {
    match (entity.native_id.as_deref(), entity.label.as_str()) {
        (Some(id), _) => id.to_string(),
        (None, "") => format!("#{index}"),
        (None, label) => label.to_string(),
    }
}
