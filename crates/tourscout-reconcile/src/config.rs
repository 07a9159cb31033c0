//! Configuration surface for the reconciliation pipeline.
//!
//! Everything is deserializable from a nested JSON options object;
//! unspecified options fall back to the defaults documented on each field.
//! `SearchConfig::normalize` enforces the one-primary-source invariant the
//! engine cannot express structurally.

use crate::context::{Diagnostic, DiagnosticKind};
use serde::{Deserialize, Serialize};
use tourscout_scene::{EntityType, RawEntity};

// ============================================================================
// Top-Level Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
    pub directory: DirectoryConfig,
    pub sheet: SheetConfig,
    pub filters: InclusionFilters,
    pub labels: LabelOptions,
    /// Create corpus entries for external records that match nothing.
    pub standalone_entries: bool,
    pub field_weights: FieldWeights,
    /// Similarity threshold handed to the matching engine.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Deadline for each external feed fetch, in seconds.
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryConfig::default(),
            sheet: SheetConfig::default(),
            filters: InclusionFilters::default(),
            labels: LabelOptions::default(),
            standalone_entries: false,
            field_weights: FieldWeights::default(),
            similarity_threshold: default_similarity_threshold(),
            feed_timeout_secs: default_feed_timeout(),
        }
    }
}

impl SearchConfig {
    /// Which source wins label/description conflicts. Exactly one after
    /// [`SearchConfig::normalize`] has run.
    pub fn primary_source(&self) -> PrimarySource {
        if self.directory.enabled && self.directory.replace_tour_data {
            PrimarySource::Directory
        } else if self.sheet.enabled && self.sheet.replace_tour_data {
            PrimarySource::Sheet
        } else {
            PrimarySource::TourNative
        }
    }

    /// Enforce the configuration invariants that cannot be expressed in the
    /// type: at most one external feed enabled at a time (directory wins),
    /// and sane numeric fallbacks. Returns the diagnostics produced so the
    /// caller can surface them; this never fails.
    pub fn normalize(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if self.directory.enabled && self.sheet.enabled {
            self.sheet.enabled = false;
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ConfigConflict,
                "directory and sheet feeds both enabled; directory wins, sheet disabled",
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ConfigConflict,
                format!(
                    "similarity threshold {} out of range; using default",
                    self.similarity_threshold
                ),
            ));
            self.similarity_threshold = default_similarity_threshold();
        }

        if self.feed_timeout_secs == 0 {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ConfigConflict,
                "feed timeout of 0 seconds; using default",
            ));
            self.feed_timeout_secs = default_feed_timeout();
        }

        diagnostics
    }
}

/// Whichever of tour-native, directory, sheet wins display conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimarySource {
    TourNative,
    Directory,
    Sheet,
}

// ============================================================================
// Feed Configs
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirectoryConfig {
    pub enabled: bool,
    pub url: Option<String>,
    /// Directory name/description replace tour-native labels on match.
    pub replace_tour_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SheetConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub replace_tour_data: bool,
    pub delimiter: char,
    pub has_header: bool,
    pub auto_type: bool,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            replace_tour_data: false,
            delimiter: ',',
            has_header: true,
            auto_type: true,
        }
    }
}

// ============================================================================
// Inclusion Filters
// ============================================================================

/// Which discovered entities and standalone records may enter the corpus.
/// Empty allow-lists mean "everything"; deny-lists always apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InclusionFilters {
    pub allowed_types: Vec<EntityType>,
    pub denied_types: Vec<EntityType>,
    pub label_allow_substrings: Vec<String>,
    pub label_deny_substrings: Vec<String>,
    /// Exact-name lists, case-insensitive.
    pub name_allow: Vec<String>,
    pub name_deny: Vec<String>,
    pub tag_allow: Vec<String>,
    pub tag_deny: Vec<String>,
    pub min_label_len: usize,
    /// Keep entities whose native label is empty (a later resolution stage
    /// may still give them one).
    pub include_unlabeled: bool,
}

impl Default for InclusionFilters {
    fn default() -> Self {
        Self {
            allowed_types: Vec::new(),
            denied_types: Vec::new(),
            label_allow_substrings: Vec::new(),
            label_deny_substrings: Vec::new(),
            name_allow: Vec::new(),
            name_deny: Vec::new(),
            tag_allow: Vec::new(),
            tag_deny: Vec::new(),
            min_label_len: 0,
            include_unlabeled: true,
        }
    }
}

impl InclusionFilters {
    /// Test a discovered entity. Returns the reason it fails, if any.
    pub fn reject_entity(&self, entity: &RawEntity) -> Option<&'static str> {
        if !self.allowed_types.is_empty() && !self.allowed_types.contains(&entity.kind) {
            return Some("type not in allow list");
        }
        if self.denied_types.contains(&entity.kind) {
            return Some("type denied");
        }
        self.reject_text(&entity.label, &entity.tags)
    }

    /// Test a standalone external record using its name, declared type and
    /// tags, so feed-only entries honor the same policy.
    pub fn reject_standalone(
        &self,
        name: &str,
        declared: Option<EntityType>,
        tags: &[String],
    ) -> Option<&'static str> {
        if let Some(kind) = declared {
            if !self.allowed_types.is_empty() && !self.allowed_types.contains(&kind) {
                return Some("type not in allow list");
            }
            if self.denied_types.contains(&kind) {
                return Some("type denied");
            }
        }
        self.reject_text(name, tags)
    }

    fn reject_text(&self, label: &str, tags: &[String]) -> Option<&'static str> {
        let lowered = label.to_lowercase();

        if label.is_empty() {
            if !self.include_unlabeled {
                return Some("unlabeled");
            }
        } else {
            if label.chars().count() < self.min_label_len {
                return Some("label shorter than minimum");
            }
            if !self.label_allow_substrings.is_empty()
                && !self
                    .label_allow_substrings
                    .iter()
                    .any(|s| lowered.contains(&s.to_lowercase()))
            {
                return Some("label not in allow list");
            }
            if self
                .label_deny_substrings
                .iter()
                .any(|s| lowered.contains(&s.to_lowercase()))
            {
                return Some("label denied");
            }
            if !self.name_allow.is_empty()
                && !self.name_allow.iter().any(|n| n.eq_ignore_ascii_case(label))
            {
                return Some("name not in allow list");
            }
            if self.name_deny.iter().any(|n| n.eq_ignore_ascii_case(label)) {
                return Some("name denied");
            }
        }

        if !self.tag_allow.is_empty()
            && !tags
                .iter()
                .any(|t| self.tag_allow.iter().any(|a| a.eq_ignore_ascii_case(t)))
        {
            return Some("no allowed tag");
        }
        if tags
            .iter()
            .any(|t| self.tag_deny.iter().any(|d| d.eq_ignore_ascii_case(t)))
        {
            return Some("tag denied");
        }

        None
    }
}

// ============================================================================
// Label Options
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelOptions {
    /// Fall back to the subtitle when the label is empty.
    pub use_subtitle_as_label: bool,
    /// Fall back to the joined tag list when label and subtitle are empty.
    pub use_tags_as_label: bool,
    /// Last-resort label for standalone entries with nothing else.
    pub placeholder: String,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            use_subtitle_as_label: false,
            use_tags_as_label: false,
            placeholder: "Untitled".to_string(),
        }
    }
}

// ============================================================================
// Field Weights
// ============================================================================

/// Per-field weights handed to the matching engine. The defaults keep the
/// documented descending order: label ≥ external name ≥ subtitle ≥ tags ≥
/// parent label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldWeights {
    pub label: f32,
    pub external_name: f32,
    pub subtitle: f32,
    pub tags: f32,
    pub parent_label: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            label: 1.0,
            external_name: 0.9,
            subtitle: 0.6,
            tags: 0.4,
            parent_label: 0.2,
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.4
}

fn default_feed_timeout() -> u64 {
    10
}

impl SearchConfig {
    /// Defaults used when the host supplies no options at all.
    pub fn with_defaults() -> Self {
        Self::default()
    }
}
