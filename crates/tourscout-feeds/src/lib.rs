//! External feed normalization.
//!
//! Up to two independently-keyed feeds can describe tour locations: a
//! structured directory file (JSON array) and a spreadsheet-style feed
//! (delimited text). Both arrive as loosely-typed rows; this crate turns
//! either into the uniform [`ExternalRecord`] shape the matcher consumes.
//!
//! A row that carries no usable key at all (no id, no tag, no name) cannot
//! ever match anything and is dropped during normalization.

pub mod directory;
pub mod fetch;
pub mod sheet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tourscout_scene::EntityType;

pub use directory::normalize_directory;
pub use fetch::{FeedSource, FileSource, StaticSource};
pub use sheet::{normalize_sheet, rewrite_published_url, SheetOptions};

#[cfg(feature = "http")]
pub use fetch::HttpSource;

// ============================================================================
// Record Shape
// ============================================================================

/// Which feed a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Directory,
    Sheet,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedKind::Directory => f.write_str("directory"),
            FeedKind::Sheet => f.write_str("sheet"),
        }
    }
}

/// One normalized row from an external feed.
///
/// All fields are optional at this layer; the only guarantee after
/// normalization is that at least one of `id`, `match_tag`, `name` is
/// populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub id: Option<String>,
    /// Primary matching tag. Feeds that declare several tags keep the first
    /// one here and the remainder in `extra_tags`.
    pub match_tag: Option<String>,
    pub extra_tags: Vec<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Optional hint about what kind of element this row describes, used
    /// only as a matching tie-breaker.
    pub declared_type: Option<EntityType>,
    pub origin: FeedKind,
}

impl ExternalRecord {
    pub fn empty(origin: FeedKind) -> Self {
        Self {
            id: None,
            match_tag: None,
            extra_tags: Vec::new(),
            name: None,
            description: None,
            image_url: None,
            declared_type: None,
            origin,
        }
    }

    /// A record without any key can never be matched or displayed; it is
    /// dropped before normalization completes.
    pub fn has_key(&self) -> bool {
        fn usable(field: &Option<String>) -> bool {
            field.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
        }
        usable(&self.id) || usable(&self.match_tag) || usable(&self.name)
    }

    /// All tags this record can match on, primary first.
    pub fn all_tags(&self) -> impl Iterator<Item = &str> {
        self.match_tag
            .iter()
            .chain(self.extra_tags.iter())
            .map(String::as_str)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("directory feed must be a JSON array, got {0}")]
    UnexpectedShape(&'static str),

    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("feed fetch failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Set a string option only when the token is non-empty after trimming.
pub(crate) fn set_nonempty(slot: &mut Option<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        *slot = Some(trimmed.to_string());
    }
}
