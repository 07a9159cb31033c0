//! Tourscout scene layer: entity extraction from an opaque scene graph.
//!
//! The host runtime hands us its scene graph as loosely-typed JSON. This
//! crate walks that graph, classifies every navigable scene and interactive
//! sub-element, and produces immutable [`RawEntity`] values for the
//! reconciliation pipeline.
//!
//! ```text
//! host graph (serde_json::Value)
//!        │
//!   ┌────▼─────┐     ┌────────────┐
//!   │  Walker  │────►│ Classifier │────► Vec<RawEntity>
//!   └──────────┘     └────────────┘
//! ```
//!
//! Traversal is best-effort by contract: a container or node that cannot be
//! introspected is skipped and logged, never fatal.

pub mod classify;
pub mod walker;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use classify::{classify, ClassifyRule, CLASSIFY_RULES};
pub use walker::SceneWalker;

// ============================================================================
// Entity Types
// ============================================================================

/// Classification tag for a discovered scene-graph element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A navigable panorama / scene.
    Scene,
    /// A point hotspot inside a panorama.
    Hotspot,
    /// A polygonal overlay with no media attached.
    Polygon,
    /// Video content (360 video or a video-bearing overlay).
    Video,
    /// An embedded web frame.
    Webframe,
    /// An image overlay.
    Image,
    /// A text overlay.
    Text,
    /// A 3D model scene.
    Model3d,
    /// An interactive marker inside a 3D model.
    Hotspot3d,
    /// A named sub-object of a 3D model.
    ModelObject3d,
    /// Media projected onto scene geometry.
    Projected,
    /// Anything we could not classify more precisely.
    Element,
}

impl EntityType {
    /// Human-readable name, used for generated fallback labels.
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityType::Scene => "Scene",
            EntityType::Hotspot => "Hotspot",
            EntityType::Polygon => "Polygon",
            EntityType::Video => "Video",
            EntityType::Webframe => "Webframe",
            EntityType::Image => "Image",
            EntityType::Text => "Text",
            EntityType::Model3d => "3D Model",
            EntityType::Hotspot3d => "3D Hotspot",
            EntityType::ModelObject3d => "3D Object",
            EntityType::Projected => "Projected Media",
            EntityType::Element => "Element",
        }
    }

    /// Parse a declared element type hint from an external feed.
    ///
    /// Feeds are written by hand, so this accepts the common spellings
    /// rather than one canonical token. Unknown hints return `None` and the
    /// hint is simply not used for tie-breaking.
    pub fn parse_declared(raw: &str) -> Option<EntityType> {
        let token = raw.trim().to_lowercase();
        let ty = match token.as_str() {
            "scene" | "panorama" | "pano" | "room" => EntityType::Scene,
            "hotspot" | "point" => EntityType::Hotspot,
            "polygon" | "area" => EntityType::Polygon,
            "video" => EntityType::Video,
            "webframe" | "web" | "iframe" => EntityType::Webframe,
            "image" | "photo" => EntityType::Image,
            "text" | "label" => EntityType::Text,
            "model" | "3dmodel" | "model3d" => EntityType::Model3d,
            "sprite" | "3dhotspot" | "hotspot3d" => EntityType::Hotspot3d,
            "3dobject" | "modelobject" => EntityType::ModelObject3d,
            "projected" => EntityType::Projected,
            "element" => EntityType::Element,
            _ => return None,
        };
        Some(ty)
    }

    /// True for types that represent a whole navigable scene rather than an
    /// element attached to one.
    pub fn is_scene_level(&self) -> bool {
        matches!(
            self,
            EntityType::Scene | EntityType::Video | EntityType::Model3d
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Raw Entities
// ============================================================================

/// One candidate element discovered in the scene graph.
///
/// Produced during a single traversal pass and immutable afterwards. The
/// `parent` field is an index into the entity table of the same walk, never
/// an owning reference, so nested sub-elements cannot form ownership cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub kind: EntityType,
    /// Identifier of the top-level container this entity came from.
    pub source_container: String,
    /// Host-assigned identifier. Opaque, may be absent, and is not
    /// guaranteed stable across host loads.
    pub native_id: Option<String>,
    pub label: String,
    pub subtitle: String,
    pub tags: Vec<String>,
    /// Position within the owning container, used for stable sorting.
    pub ordinal: usize,
    /// Index of the owning entity in the walk output, for sub-elements.
    pub parent: Option<usize>,
    /// Raw handle to the underlying host object. Only ever used to trigger
    /// navigation after a search hit; indexing never reads through it.
    pub handle: Value,
}

impl RawEntity {
    /// Case-insensitive tag membership test.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// True when the host assigned this entity the given id.
    pub fn id_is(&self, id: &str) -> bool {
        self.native_id.as_deref() == Some(id)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene graph is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("scene graph root must be a JSON object, got {0}")]
    UnexpectedRoot(&'static str),
}

/// Parse a scene graph delivered as a JSON string.
///
/// The walker itself never fails, but the graph must at least be a JSON
/// object to be walkable at all.
pub fn parse_scene_graph(raw: &str) -> Result<Value, SceneError> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(SceneError::UnexpectedRoot(json_type_name(&value)));
    }
    Ok(value)
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_accepts_common_spellings() {
        assert_eq!(
            EntityType::parse_declared("Panorama"),
            Some(EntityType::Scene)
        );
        assert_eq!(
            EntityType::parse_declared(" webframe "),
            Some(EntityType::Webframe)
        );
        assert_eq!(EntityType::parse_declared("banana"), None);
    }

    #[test]
    fn parse_scene_graph_rejects_non_objects() {
        assert!(parse_scene_graph("[1, 2, 3]").is_err());
        assert!(parse_scene_graph("{\"main\": {}}").is_ok());
    }

    #[test]
    fn has_tag_is_case_insensitive() {
        let entity = RawEntity {
            kind: EntityType::Scene,
            source_container: "main".into(),
            native_id: Some("rm001".into()),
            label: "Lobby".into(),
            subtitle: String::new(),
            tags: vec!["Lobby".into(), "floor-1".into()],
            ordinal: 0,
            parent: None,
            handle: Value::Null,
        };
        assert!(entity.has_tag("lobby"));
        assert!(entity.has_tag("FLOOR-1"));
        assert!(!entity.has_tag("floor-2"));
    }
}
