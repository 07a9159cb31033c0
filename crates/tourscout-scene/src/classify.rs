//! Type classification for raw scene-graph nodes.
//!
//! Classification is a priority cascade over duck-typed signals: explicit
//! flags beat geometry, geometry beats identifier heuristics, and so on down
//! to a label-keyword table. Nodes routinely match more than one signal (a
//! polygon can carry both a video and a URL), so the cascade order is part
//! of the contract, not an implementation detail. The rules live in one
//! ordered table so the precedence can be tested in isolation.

use crate::EntityType;
use serde_json::Value;

/// Identifier substring that marks interactive markers inside 3D models.
/// The host gives these the same class as static geometry, so the id is the
/// only signal that distinguishes them.
const SPRITE_MARKER: &str = "sprite";

/// One classification rule: returns a type when its signal fires.
pub struct ClassifyRule {
    pub name: &'static str,
    pub apply: fn(&Value, &str) -> Option<EntityType>,
}

/// The classification cascade, highest priority first.
pub const CLASSIFY_RULES: &[ClassifyRule] = &[
    ClassifyRule {
        name: "projected-flag",
        apply: projected_flag,
    },
    ClassifyRule {
        name: "polygon-geometry",
        apply: polygon_geometry,
    },
    ClassifyRule {
        name: "sprite-id-marker",
        apply: sprite_id_marker,
    },
    ClassifyRule {
        name: "class-table",
        apply: class_table,
    },
    ClassifyRule {
        name: "property-presence",
        apply: property_presence,
    },
    ClassifyRule {
        name: "label-keywords",
        apply: label_keywords,
    },
];

/// Classify a raw node, falling back to [`EntityType::Element`].
///
/// Pure and deterministic: the same node and label always produce the same
/// type, and the first matching rule in [`CLASSIFY_RULES`] wins.
pub fn classify(node: &Value, fallback_label: &str) -> EntityType {
    CLASSIFY_RULES
        .iter()
        .find_map(|rule| (rule.apply)(node, fallback_label))
        .unwrap_or(EntityType::Element)
}

// ============================================================================
// Rules
// ============================================================================

/// Rule 1: an explicit `projected` flag overrides everything, including
/// geometry. Projected media nodes also carry vertices.
fn projected_flag(node: &Value, _label: &str) -> Option<EntityType> {
    if node.get("projected").and_then(Value::as_bool) == Some(true) {
        Some(EntityType::Projected)
    } else {
        None
    }
}

/// Rule 2: anything with more than two vertices is a polygon, refined by
/// which media it carries.
fn polygon_geometry(node: &Value, _label: &str) -> Option<EntityType> {
    let vertices = node
        .get("vertices")
        .or_else(|| node.get("points"))
        .and_then(Value::as_array)?;
    if vertices.len() <= 2 {
        return None;
    }
    if node.get("video").is_some() {
        Some(EntityType::Video)
    } else if node.get("image").is_some() {
        Some(EntityType::Image)
    } else {
        Some(EntityType::Polygon)
    }
}

/// Rule 3: interactive 3D markers are only recognizable by the reserved
/// keyword in their host id.
fn sprite_id_marker(node: &Value, _label: &str) -> Option<EntityType> {
    let id = node.get("id").and_then(Value::as_str)?;
    if id.to_lowercase().contains(SPRITE_MARKER) {
        Some(EntityType::Hotspot3d)
    } else {
        None
    }
}

/// Rule 4: static lookup from host-internal class name.
fn class_table(node: &Value, _label: &str) -> Option<EntityType> {
    let class = node.get("class").and_then(Value::as_str)?;
    let ty = match class {
        "Panorama" | "HDRPanorama" | "LivePanorama" => EntityType::Scene,
        "Video360" => EntityType::Video,
        "Model3D" => EntityType::Model3d,
        "Model3DObject" => EntityType::ModelObject3d,
        "Sprite3DObject" | "SpriteModel3DObject" => EntityType::Hotspot3d,
        "HotspotPanoramaOverlayArea" => EntityType::Polygon,
        "HotspotPanoramaOverlayImage" | "ImagePanoramaOverlay" => EntityType::Image,
        "HotspotPanoramaOverlayText" | "TextPanoramaOverlay" => EntityType::Text,
        "HotspotPanoramaOverlayVideo" | "VideoPanoramaOverlay" => EntityType::Video,
        "WebFramePanoramaOverlay" => EntityType::Webframe,
        _ => return None,
    };
    Some(ty)
}

/// Rule 5: property presence, checked in fixed order so a node carrying
/// both a `url` and a `video` field classifies as a webframe.
fn property_presence(node: &Value, _label: &str) -> Option<EntityType> {
    if node.get("url").is_some() {
        Some(EntityType::Webframe)
    } else if node.get("video").is_some() {
        Some(EntityType::Video)
    } else if node.get("model").is_some() {
        Some(EntityType::Model3d)
    } else if node.get("sprite").is_some() {
        Some(EntityType::Hotspot3d)
    } else {
        None
    }
}

/// Rule 6: last-resort label keyword table, evaluated in order.
fn label_keywords(_node: &Value, label: &str) -> Option<EntityType> {
    const KEYWORDS: &[(&str, EntityType)] = &[
        ("video", EntityType::Video),
        ("youtube", EntityType::Video),
        ("web", EntityType::Webframe),
        ("map", EntityType::Image),
        ("photo", EntityType::Image),
        ("image", EntityType::Image),
        ("info", EntityType::Text),
    ];
    let lowered = label.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(kw, _)| lowered.contains(kw))
        .map(|(_, ty)| *ty)
}
