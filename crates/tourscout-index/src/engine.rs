//! Reference matching engine.
//!
//! The production engine is an external collaborator; this one exists so
//! the pipeline is testable end to end and so the CLI works out of the
//! box. Scoring: per field, exact containment counts as a full match,
//! otherwise Jaro-Winkler similarity; the best weighted field score is
//! scaled by the entry's provenance boost and gated by the threshold.

use crate::{MatchingEngine, ScoredHit, SearchRecord};
use tourscout_reconcile::FieldWeights;

#[derive(Debug, Default)]
pub struct SimilarityEngine;

impl MatchingEngine for SimilarityEngine {
    fn search(
        &self,
        term: &str,
        records: &[SearchRecord],
        weights: &FieldWeights,
        threshold: f32,
    ) -> Vec<ScoredHit> {
        let needle = term.to_lowercase();
        let mut hits: Vec<ScoredHit> = records
            .iter()
            .filter_map(|record| {
                let fields = [
                    (record.label.as_str(), weights.label),
                    (record.external_name.as_str(), weights.external_name),
                    (record.subtitle.as_str(), weights.subtitle),
                    (record.tags.as_str(), weights.tags),
                    (record.parent_label.as_str(), weights.parent_label),
                ];
                let best = fields
                    .iter()
                    .map(|(field, weight)| field_score(&needle, field) * weight)
                    .fold(0.0f32, f32::max);
                let score = best * record.boost;
                if best >= threshold {
                    Some(ScoredHit {
                        entry: record.entry,
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        // Descending by score; ties keep presentation order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.entry.cmp(&b.entry))
        });
        hits
    }
}

fn field_score(needle: &str, field: &str) -> f32 {
    if field.is_empty() {
        return 0.0;
    }
    let haystack = field.to_lowercase();
    if haystack.contains(needle) {
        return 1.0;
    }
    strsim::jaro_winkler(needle, &haystack) as f32
}
