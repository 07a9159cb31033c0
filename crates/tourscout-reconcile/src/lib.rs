//! Reconciliation core: one corpus entry per logical location.
//!
//! Scene entities and external feed records describe the same real-world
//! places through different keys. This crate owns the merge:
//!
//! ```text
//! RawEntity[] ──┐
//!               ├──► Matcher ──► Reconciler ──► Label Resolver ──► CorpusEntry[]
//! ExternalRecord[] ─┘                 │
//!                              dedup sweep
//! ```
//!
//! Everything runs inside one [`IndexBuildContext`]; no stage reads ambient
//! global state, and the consumed-key bookkeeping that prevents an external
//! record from producing two entries lives on the context, scoped to a
//! single build.

pub mod config;
pub mod context;
pub mod labels;
pub mod matcher;
pub mod reconciler;

use serde::{Deserialize, Serialize};
use tourscout_feeds::{ExternalRecord, FeedKind};
use tourscout_scene::{EntityType, RawEntity};

pub use config::{
    DirectoryConfig, FieldWeights, InclusionFilters, LabelOptions, PrimarySource, SearchConfig,
    SheetConfig,
};
pub use context::{Diagnostic, DiagnosticKind, IndexBuildContext};
pub use labels::{finalize as finalize_labels, resolve_label, ResolvedLabel};
pub use matcher::{MatchCandidate, MatchConfidence, MatchResult};
pub use reconciler::build_corpus;

// ============================================================================
// Corpus Entries
// ============================================================================

/// Which sources contributed to a corpus entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub tour: bool,
    pub directory: bool,
    pub sheet: bool,
}

impl Provenance {
    pub fn tour_only() -> Self {
        Self {
            tour: true,
            ..Self::default()
        }
    }

    pub fn with_feed(mut self, feed: FeedKind) -> Self {
        match feed {
            FeedKind::Directory => self.directory = true,
            FeedKind::Sheet => self.sheet = true,
        }
        self
    }

    /// True when any external feed contributed.
    pub fn external(&self) -> bool {
        self.directory || self.sheet
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.tour {
            parts.push("tour");
        }
        if self.directory {
            parts.push("directory");
        }
        if self.sheet {
            parts.push("sheet");
        }
        if parts.is_empty() {
            parts.push("none");
        }
        f.write_str(&parts.join("+"))
    }
}

/// The unit indexed for search: exactly one per logical location or
/// element, regardless of how many sources referenced it.
///
/// Constructed once per build and mutated only inside the reconciliation
/// pass; after the corpus is handed to the index builder it is read-only
/// and rebuilt wholesale on any change. The entry is the sole long-lived
/// owner of its contributing entity and record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub kind: EntityType,
    pub label: String,
    pub subtitle: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    /// Relevance boost assigned by the index builder from provenance.
    pub boost: f32,
    /// Derived from the entity's container ordinal; standalone entries sort
    /// after every native entity.
    pub sort_key: usize,
    pub parent_label: Option<String>,
    pub parent_sort_key: Option<usize>,
    pub origin: Provenance,
    pub entity: Option<RawEntity>,
    pub record: Option<ExternalRecord>,
}

impl CorpusEntry {
    /// Native id of the contributing entity, if any.
    pub fn native_id(&self) -> Option<&str> {
        self.entity.as_ref().and_then(|e| e.native_id.as_deref())
    }

    /// True for entries nested under another entity.
    pub fn is_child(&self) -> bool {
        self.parent_label.is_some()
    }

    /// External name as the feed spelled it, for weighted search fields.
    pub fn external_name(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.name.as_deref())
    }
}
