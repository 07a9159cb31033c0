//! Per-build context.
//!
//! Every pipeline stage receives the [`IndexBuildContext`] explicitly;
//! nothing reads module-level state. The context carries the normalized
//! configuration, the structured diagnostics produced along the way, and
//! the consumed-key sets the matcher uses to guarantee exactly-once record
//! consumption. A context lives for exactly one build and is discarded
//! with its corpus.

use crate::config::SearchConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// Category of a build diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Mutually exclusive options enabled together; auto-corrected.
    ConfigConflict,
    /// A record matched several entities; tie-break applied.
    AmbiguousMatch,
    /// Two corpus entries collided on label/id; first kept.
    DuplicateEntry,
    /// An external feed failed or timed out; degraded to empty.
    FeedFailure,
    /// A scene-graph node or container could not be introspected.
    Traversal,
}

/// One structured warning from a build. Also mirrored to `tracing` so the
/// host log shows it; tests assert on these instead of capturing logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// State threaded through one index build.
pub struct IndexBuildContext {
    pub build_id: Uuid,
    pub config: SearchConfig,
    diagnostics: Vec<Diagnostic>,
    /// Record ids already merged into the corpus this build.
    pub(crate) consumed_ids: HashSet<String>,
    /// Record tags already merged into the corpus this build.
    pub(crate) consumed_tags: HashSet<String>,
}

impl IndexBuildContext {
    /// Create a context, normalizing the configuration and capturing any
    /// conflict diagnostics that produced.
    pub fn new(mut config: SearchConfig) -> Self {
        let mut diagnostics = config.normalize();
        for diag in &diagnostics {
            warn!(kind = ?diag.kind, "{}", diag.message);
        }
        diagnostics.shrink_to_fit();
        Self {
            build_id: Uuid::new_v4(),
            config,
            diagnostics,
            consumed_ids: HashSet::new(),
            consumed_tags: HashSet::new(),
        }
    }

    /// Record a warning-level diagnostic and mirror it to the log.
    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = ?kind, build = %self.build_id, "{message}");
        self.diagnostics.push(Diagnostic::new(kind, message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub(crate) fn consume_id(&mut self, id: &str) -> bool {
        self.consumed_ids.insert(id.to_lowercase())
    }

    pub(crate) fn id_consumed(&self, id: &str) -> bool {
        self.consumed_ids.contains(&id.to_lowercase())
    }

    pub(crate) fn consume_tag(&mut self, tag: &str) -> bool {
        self.consumed_tags.insert(tag.to_lowercase())
    }

    pub(crate) fn tag_consumed(&self, tag: &str) -> bool {
        self.consumed_tags.contains(&tag.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_captures_normalization_diagnostics() {
        let mut config = SearchConfig::with_defaults();
        config.directory.enabled = true;
        config.sheet.enabled = true;

        let ctx = IndexBuildContext::new(config);
        assert_eq!(ctx.count_of(DiagnosticKind::ConfigConflict), 1);
        assert!(!ctx.config.sheet.enabled);
    }

    #[test]
    fn consumed_keys_are_case_insensitive() {
        let mut ctx = IndexBuildContext::new(SearchConfig::with_defaults());
        assert!(ctx.consume_id("RM001"));
        assert!(ctx.id_consumed("rm001"));
        assert!(!ctx.consume_id("rm001"));

        assert!(ctx.consume_tag("Lobby"));
        assert!(ctx.tag_consumed("LOBBY"));
    }
}
