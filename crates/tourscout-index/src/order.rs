//! Presentation ordering.
//!
//! Results render grouped by resolved type: scene-level groups first, then
//! element and child groups, in a fixed priority. Inside a group, entries
//! follow their container ordinal so results respect the tour's own
//! playlist order, with an alphabetical tiebreak. A type with no entries
//! simply does not appear.

use tourscout_reconcile::CorpusEntry;
use tourscout_scene::EntityType;

/// Fixed group rendering order, highest priority first.
pub const GROUP_ORDER: &[EntityType] = &[
    EntityType::Scene,
    EntityType::Model3d,
    EntityType::Video,
    EntityType::Projected,
    EntityType::Hotspot,
    EntityType::Polygon,
    EntityType::Image,
    EntityType::Text,
    EntityType::Webframe,
    EntityType::Hotspot3d,
    EntityType::ModelObject3d,
    EntityType::Element,
];

fn group_rank(kind: EntityType) -> usize {
    GROUP_ORDER
        .iter()
        .position(|g| *g == kind)
        .unwrap_or(GROUP_ORDER.len())
}

/// Sort a corpus into presentation order in place.
pub fn presentation_order(corpus: &mut [CorpusEntry]) {
    corpus.sort_by(|a, b| {
        group_rank(a.kind)
            .cmp(&group_rank(b.kind))
            .then(a.sort_key.cmp(&b.sort_key))
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
    });
}
