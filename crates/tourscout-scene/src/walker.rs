//! Scene-graph traversal.
//!
//! The host exposes its content as a hierarchy of top-level containers
//! (a `"main"` catalog, plus an optional `"detail"` catalog for nested 3D
//! content), each holding an ordered scene list, with interactive
//! sub-elements attached to individual scenes. Hosts differ in where they
//! hang the sub-elements, so discovery tries several strategies in a fixed
//! priority order and stops at the first one that yields anything, which
//! also prevents the same child being found twice through two strategies.
//!
//! Failure policy: anything that cannot be introspected is skipped with a
//! warning. The walk itself never fails; a graph with no navigable
//! containers simply produces an empty entity list.

use crate::{classify, json_type_name, EntityType, RawEntity};
use serde_json::Value;
use tracing::{debug, warn};

/// Top-level container keys probed on the scene-graph root, in order.
const CONTAINER_KEYS: &[&str] = &["main", "detail"];

/// Host classes that denote attachable sub-elements (as opposed to whole
/// scenes), used by the registry discovery strategy.
const ELEMENT_CLASSES: &[&str] = &[
    "HotspotPanoramaOverlayArea",
    "HotspotPanoramaOverlayImage",
    "HotspotPanoramaOverlayText",
    "HotspotPanoramaOverlayVideo",
    "ImagePanoramaOverlay",
    "TextPanoramaOverlay",
    "VideoPanoramaOverlay",
    "WebFramePanoramaOverlay",
    "Model3DObject",
    "Sprite3DObject",
    "SpriteModel3DObject",
];

/// Walks a host scene graph and yields [`RawEntity`] values.
pub struct SceneWalker<'a> {
    root: &'a Value,
}

impl<'a> SceneWalker<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Traverse every present container and return the discovered entities
    /// in discovery order. Scenes come before their sub-elements; each
    /// sub-element's `parent` indexes its owning scene in the returned list.
    pub fn walk(&self) -> Vec<RawEntity> {
        let mut out = Vec::new();

        let containers = self.containers();
        if containers.is_empty() {
            warn!("scene graph has no navigable containers; corpus will be empty");
            return out;
        }

        for (container_id, container) in containers {
            self.walk_container(&container_id, container, &mut out);
        }
        out
    }

    /// Resolve the top-level containers present on this root. Missing
    /// containers degrade silently to whatever is there; a root that holds
    /// a scene list directly is treated as the main catalog.
    fn containers(&self) -> Vec<(String, &'a Value)> {
        let mut found = Vec::new();
        for key in CONTAINER_KEYS {
            match self.root.get(*key) {
                Some(container) if container.is_object() => {
                    let id = container
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or(key)
                        .to_string();
                    found.push((id, container));
                }
                Some(other) => {
                    warn!(
                        container = *key,
                        shape = json_type_name(other),
                        "container is not an object; skipping"
                    );
                }
                None => debug!(container = *key, "container absent"),
            }
        }
        if found.is_empty() && scene_list(self.root).is_some() {
            found.push(("main".to_string(), self.root));
        }
        found
    }

    fn walk_container(&self, container_id: &str, container: &'a Value, out: &mut Vec<RawEntity>) {
        let scenes = match scene_list(container) {
            Some(scenes) => scenes,
            None => {
                warn!(container = container_id, "container has no scene list; skipping");
                return;
            }
        };

        for (ordinal, scene) in scenes.iter().enumerate() {
            if !scene.is_object() {
                warn!(
                    container = container_id,
                    ordinal,
                    shape = json_type_name(scene),
                    "scene node is not an object; skipping"
                );
                continue;
            }

            let scene_index = out.len();
            out.push(make_entity(scene, container_id, ordinal, None));

            let scene_id = scene.get("id").and_then(Value::as_str);
            let children = self.discover_children(scene, container, scene_id);
            for (child_ordinal, child) in children.iter().enumerate() {
                if !child.is_object() {
                    warn!(
                        container = container_id,
                        scene = scene_id.unwrap_or("?"),
                        "sub-element is not an object; skipping"
                    );
                    continue;
                }
                out.push(make_entity(
                    child,
                    container_id,
                    child_ordinal,
                    Some(scene_index),
                ));
            }
        }
    }

    /// Sub-element discovery strategies, tried in priority order. The first
    /// strategy that yields any children wins outright; later strategies
    /// are not consulted, so a child can never be discovered twice.
    fn discover_children(
        &self,
        scene: &'a Value,
        container: &'a Value,
        scene_id: Option<&str>,
    ) -> Vec<&'a Value> {
        // Strategy 1: the scene node lists its own overlays.
        if let Some(overlays) = scene.get("overlays").and_then(Value::as_array) {
            if !overlays.is_empty() {
                debug!(scene = scene_id.unwrap_or("?"), strategy = "overlays", count = overlays.len(), "children discovered");
                return overlays.iter().collect();
            }
        }

        // Strategy 2: the container groups children by scene id.
        if let Some(id) = scene_id {
            if let Some(grouped) = container
                .get("childrenByTag")
                .and_then(|m| m.get(id))
                .and_then(Value::as_array)
            {
                if !grouped.is_empty() {
                    debug!(scene = id, strategy = "childrenByTag", count = grouped.len(), "children discovered");
                    return grouped.iter().collect();
                }
            }
        }

        // Strategy 3: global registry, filtered by declared class and a
        // best-effort parent-ownership inference.
        if let Some(id) = scene_id {
            if let Some(registry) = self.root.get("registry").and_then(Value::as_array) {
                let prefix = format!("{id}_");
                let owned: Vec<&Value> = registry
                    .iter()
                    .filter(|elem| {
                        let class_ok = elem
                            .get("class")
                            .and_then(Value::as_str)
                            .map(|c| ELEMENT_CLASSES.contains(&c))
                            .unwrap_or(false);
                        class_ok && belongs_to(elem, id, &prefix)
                    })
                    .collect();
                if !owned.is_empty() {
                    debug!(scene = id, strategy = "registry", count = owned.len(), "children discovered");
                    return owned;
                }
            }
        }

        Vec::new()
    }
}

/// A registry element belongs to a scene when it names it as parent, or —
/// failing an explicit parent — when its id carries the scene id prefix.
fn belongs_to(elem: &Value, scene_id: &str, prefix: &str) -> bool {
    if let Some(parent) = elem.get("parent").and_then(Value::as_str) {
        return parent == scene_id;
    }
    elem.get("id")
        .and_then(Value::as_str)
        .map(|id| id.starts_with(prefix))
        .unwrap_or(false)
}

fn scene_list(container: &Value) -> Option<&Vec<Value>> {
    container
        .get("scenes")
        .or_else(|| container.get("items"))
        .and_then(Value::as_array)
}

fn make_entity(
    node: &Value,
    container_id: &str,
    ordinal: usize,
    parent: Option<usize>,
) -> RawEntity {
    let label = string_field(node, "label");
    RawEntity {
        kind: classify(node, &label),
        source_container: container_id.to_string(),
        native_id: node.get("id").and_then(Value::as_str).map(str::to_string),
        subtitle: string_field(node, "subtitle"),
        tags: tag_list(node),
        ordinal,
        parent,
        handle: node.clone(),
        label,
    }
}

/// Read a string field from the node, falling back to the nested `data`
/// object some hosts use.
fn string_field(node: &Value, key: &str) -> String {
    node.get(key)
        .or_else(|| node.get("data").and_then(|d| d.get(key)))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn tag_list(node: &Value) -> Vec<String> {
    node.get("tags")
        .or_else(|| node.get("data").and_then(|d| d.get("tags")))
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_container_graph() -> Value {
        json!({
            "main": {
                "id": "mainList",
                "scenes": [
                    {
                        "id": "rm001",
                        "class": "Panorama",
                        "label": "Lobby",
                        "tags": ["lobby", "floor-1"],
                        "overlays": [
                            {"id": "rm001_hs1", "class": "HotspotPanoramaOverlayImage", "label": "Front desk"},
                            {"id": "rm001_hs2", "class": "WebFramePanoramaOverlay", "label": "Booking"}
                        ]
                    },
                    {"id": "rm002", "class": "Panorama", "label": "Cafeteria"}
                ]
            },
            "detail": {
                "scenes": [
                    {"id": "model1", "class": "Model3D", "label": "Building model"}
                ]
            },
            "registry": [
                {"id": "rm002_area", "class": "HotspotPanoramaOverlayArea", "label": "Menu board",
                 "vertices": [[0,0],[1,0],[1,1]]}
            ]
        })
    }

    #[test]
    fn walk_covers_both_containers() {
        let graph = two_container_graph();
        let entities = SceneWalker::new(&graph).walk();

        let containers: Vec<&str> = entities
            .iter()
            .map(|e| e.source_container.as_str())
            .collect();
        assert!(containers.contains(&"mainList"));
        assert!(containers.contains(&"detail"));

        // 2 main scenes + 2 overlays + 1 registry area + 1 detail scene
        assert_eq!(entities.len(), 6);
    }

    #[test]
    fn overlays_strategy_shadows_registry() {
        // rm001 has overlays *and* could match registry entries by prefix;
        // only the overlays must be discovered.
        let mut graph = two_container_graph();
        graph["registry"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "rm001_extra", "class": "HotspotPanoramaOverlayText"}));

        let entities = SceneWalker::new(&graph).walk();
        assert!(!entities.iter().any(|e| e.native_id.as_deref() == Some("rm001_extra")));
    }

    #[test]
    fn registry_children_attach_by_prefix() {
        let graph = two_container_graph();
        let entities = SceneWalker::new(&graph).walk();

        let area = entities
            .iter()
            .find(|e| e.native_id.as_deref() == Some("rm002_area"))
            .expect("registry child discovered");
        assert_eq!(area.kind, EntityType::Polygon);

        let parent = area.parent.expect("child has a parent");
        assert_eq!(entities[parent].native_id.as_deref(), Some("rm002"));
    }

    #[test]
    fn missing_detail_container_degrades() {
        let graph = json!({
            "main": {"scenes": [{"id": "s1", "class": "Panorama", "label": "Only"}]}
        });
        let entities = SceneWalker::new(&graph).walk();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityType::Scene);
    }

    #[test]
    fn malformed_nodes_are_skipped_not_fatal() {
        let graph = json!({
            "main": {"scenes": [
                42,
                {"id": "ok", "class": "Panorama", "label": "Good"},
                "nope"
            ]},
            "detail": "not-a-container"
        });
        let entities = SceneWalker::new(&graph).walk();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].label, "Good");
        // Ordinal reflects position in the container, including skipped slots.
        assert_eq!(entities[0].ordinal, 1);
    }

    #[test]
    fn empty_graph_yields_empty_walk() {
        let graph = json!({});
        assert!(SceneWalker::new(&graph).walk().is_empty());
    }

    #[test]
    fn bare_scene_list_is_treated_as_main() {
        let graph = json!({"scenes": [{"id": "s1", "class": "Panorama", "label": "A"}]});
        let entities = SceneWalker::new(&graph).walk();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].source_container, "main");
    }
}
