//! Search index assembly.
//!
//! Takes the finalized corpus, assigns provenance boosts, fixes the grouped
//! presentation order, and wraps everything in a [`SearchIndex`] the
//! presentation layer can query. The actual text matching is delegated to
//! an external engine behind the [`MatchingEngine`] trait; a
//! strsim-backed reference implementation ships for tests and the CLI.

pub mod engine;
pub mod order;
pub mod service;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tourscout_reconcile::{CorpusEntry, FieldWeights, SearchConfig};

pub use engine::SimilarityEngine;
pub use order::{presentation_order, GROUP_ORDER};
pub use service::{
    BuildOutcome, BuildReport, HostBinding, IndexService, ReadinessProbe, StaticHost,
    READINESS_PROBES,
};

// ============================================================================
// Provenance Boosts
// ============================================================================

/// Relevance boosts assigned from provenance. The ladder order is the
/// contract; the constants are only sensible defaults. Boosts change
/// ranking, never inclusion.
pub mod boosts {
    use tourscout_feeds::FeedKind;
    use tourscout_reconcile::{CorpusEntry, PrimarySource};

    /// Entries enhanced by the primary external source.
    pub const EXTERNAL_ENHANCED: f32 = 2.0;
    /// Tour-native entries that carry their own label.
    pub const LABELED_NATIVE: f32 = 1.5;
    /// Entries whose label had to be generated.
    pub const UNLABELED: f32 = 1.0;
    /// Nested child elements rank below everything scene-level.
    pub const CHILD: f32 = 0.5;

    pub fn assign(entry: &CorpusEntry, primary: PrimarySource) -> f32 {
        if entry.is_child() {
            return CHILD;
        }
        let enhanced_by_primary = entry
            .record
            .as_ref()
            .map(|r| {
                matches!(
                    (primary, r.origin),
                    (PrimarySource::Directory, FeedKind::Directory)
                        | (PrimarySource::Sheet, FeedKind::Sheet)
                )
            })
            .unwrap_or(false);
        if enhanced_by_primary {
            EXTERNAL_ENHANCED
        } else if entry
            .entity
            .as_ref()
            .map(|e| !e.label.is_empty())
            .unwrap_or(false)
        {
            LABELED_NATIVE
        } else {
            UNLABELED
        }
    }
}

// ============================================================================
// Matching Engine Seam
// ============================================================================

/// One flat record handed to the matching engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Index into the corpus this record stands for.
    pub entry: usize,
    pub label: String,
    pub external_name: String,
    pub subtitle: String,
    pub tags: String,
    pub parent_label: String,
    pub boost: f32,
}

/// A ranked hit from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    pub entry: usize,
    pub score: f32,
}

/// The external approximate-string-matching engine, as consumed. Its
/// ranking internals are out of scope here; the contract is flat records
/// in, ranked hits out, nothing below the threshold.
pub trait MatchingEngine: Send + Sync {
    fn search(
        &self,
        term: &str,
        records: &[SearchRecord],
        weights: &FieldWeights,
        threshold: f32,
    ) -> Vec<ScoredHit>;
}

// ============================================================================
// Search Index
// ============================================================================

/// The finished, queryable index. Entries are already in presentation
/// order (grouped by type, sorted within group); search delegates to the
/// engine and maps hits back to entries. An empty corpus behaves as "no
/// results", never as an error.
pub struct SearchIndex {
    entries: Vec<CorpusEntry>,
    records: Vec<SearchRecord>,
    engine: Arc<dyn MatchingEngine>,
    weights: FieldWeights,
    threshold: f32,
}

impl SearchIndex {
    /// Assemble the index from a finalized corpus: boosts, presentation
    /// order, flat engine records.
    pub fn build(
        mut corpus: Vec<CorpusEntry>,
        config: &SearchConfig,
        engine: Arc<dyn MatchingEngine>,
    ) -> Self {
        let primary = config.primary_source();
        for entry in corpus.iter_mut() {
            entry.boost = boosts::assign(entry, primary);
        }
        presentation_order(&mut corpus);

        let records = corpus
            .iter()
            .enumerate()
            .map(|(index, entry)| SearchRecord {
                entry: index,
                label: entry.label.clone(),
                external_name: entry.external_name().unwrap_or_default().to_string(),
                subtitle: entry.subtitle.clone(),
                tags: entry.tags.join(" "),
                parent_label: entry.parent_label.clone().unwrap_or_default(),
                boost: entry.boost,
            })
            .collect();

        Self {
            entries: corpus,
            records,
            engine,
            weights: config.field_weights.clone(),
            threshold: config.similarity_threshold,
        }
    }

    /// Ranked search. A blank or wildcard term returns everything in
    /// presentation order.
    pub fn search(&self, term: &str) -> Vec<&CorpusEntry> {
        let term = term.trim();
        if term.is_empty() || term == "*" {
            return self.get_all();
        }
        self.engine
            .search(term, &self.records, &self.weights, self.threshold)
            .into_iter()
            .filter_map(|hit| self.entries.get(hit.entry))
            .collect()
    }

    /// The wildcard path: every entry, grouped and ordered for display.
    pub fn get_all(&self) -> Vec<&CorpusEntry> {
        self.entries.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }
}
