//! Integration tests for the complete Tourscout pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Scene graph → Walker → RawEntities
//! - Feeds → Normalization → ExternalRecords
//! - Matcher → Reconciler → Corpus → SearchIndex
//! - IndexService orchestration (feeds, degradation, rebuild)
//!
//! Run with: cargo test --test integration_tests

use serde_json::json;
use std::sync::Arc;
use tourscout_index::{BuildOutcome, IndexService, SimilarityEngine, StaticHost};
use tourscout_reconcile::{DiagnosticKind, SearchConfig};

fn hotel_graph() -> serde_json::Value {
    json!({
        "main": {
            "scenes": [
                {
                    "id": "rm001",
                    "class": "Panorama",
                    "label": "Lobby",
                    "subtitle": "Ground floor",
                    "tags": ["lobby", "entrance"],
                    "overlays": [
                        {"id": "rm001_desk", "class": "HotspotPanoramaOverlayArea",
                         "label": "Front Desk", "vertices": [[0,0],[1,0],[1,1]]},
                        {"id": "rm001_video", "class": "VideoPanoramaOverlay",
                         "label": "Welcome Video"}
                    ]
                },
                {"id": "rm002", "class": "Panorama", "label": "Cafe", "tags": ["cafe"]},
                {"id": "rm003", "class": "Panorama", "label": "", "tags": []}
            ]
        }
    })
}

fn service_with(config: SearchConfig, graph: serde_json::Value) -> IndexService {
    IndexService::new(
        config,
        Arc::new(StaticHost::new(graph)),
        Arc::new(SimilarityEngine),
    )
}

async fn built(service: &IndexService) -> tourscout_index::BuildReport {
    match service.rebuild().await {
        BuildOutcome::Built(report) => report,
        BuildOutcome::Deferred => panic!("no concurrent build in tests"),
    }
}

// ============================================================================
// Scenario A: no feeds → corpus mirrors the filtered tour entities
// ============================================================================

#[tokio::test]
async fn test_no_feeds_corpus_equals_filtered_entities() {
    let service = service_with(SearchConfig::with_defaults(), hotel_graph());
    let report = built(&service).await;

    // Three scenes plus two overlay children.
    assert_eq!(report.entities, 5);
    assert_eq!(report.records, 0);
    assert_eq!(report.entries, 5);

    let index = service.current().unwrap();
    let labels: Vec<&str> = index.get_all().iter().map(|e| e.label.as_str()).collect();
    // The unlabeled scene gets an ordinal label; scenes group first.
    assert!(labels.contains(&"Lobby"));
    assert!(labels.contains(&"Cafe"));
    assert!(labels.contains(&"Scene 3"));
}

#[tokio::test]
async fn test_type_filter_shrinks_the_corpus() {
    use tourscout_scene::EntityType;

    let mut config = SearchConfig::with_defaults();
    config.filters.allowed_types = vec![EntityType::Scene];
    let service = service_with(config, hotel_graph());
    let report = built(&service).await;

    assert_eq!(report.entities, 5);
    assert_eq!(report.entries, 3);
}

// ============================================================================
// Scenario B: directory id match with replaceTourData
// ============================================================================

#[tokio::test]
async fn test_directory_name_replaces_tour_label_on_id_match() {
    use tourscout_feeds::StaticSource;

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;
    config.directory.replace_tour_data = true;

    let feed = r#"[
        {"id": "rm001", "name": "Grand Lobby", "description": "Marble and brass"}
    ]"#;
    let service = service_with(config, hotel_graph())
        .with_directory_source(Arc::new(StaticSource::new(feed)));
    built(&service).await;

    let index = service.current().unwrap();
    let lobby = index
        .entries()
        .iter()
        .find(|e| e.native_id() == Some("rm001"))
        .expect("rm001 survives reconciliation");
    assert_eq!(lobby.label, "Grand Lobby");
    assert_eq!(lobby.subtitle, "Marble and brass");
}

#[tokio::test]
async fn test_tour_label_wins_without_replace_tour_data() {
    use tourscout_feeds::StaticSource;

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;

    let feed = r#"[{"id": "rm001", "name": "Grand Lobby"}]"#;
    let service = service_with(config, hotel_graph())
        .with_directory_source(Arc::new(StaticSource::new(feed)));
    built(&service).await;

    let index = service.current().unwrap();
    let lobby = index
        .entries()
        .iter()
        .find(|e| e.native_id() == Some("rm001"))
        .unwrap();
    assert_eq!(lobby.label, "Lobby");
    // The record still enhances the entry even when it does not rename it.
    assert!(lobby.record.is_some());
}

// ============================================================================
// Scenario C: duplicate tag records collapse to one entry
// ============================================================================

#[tokio::test]
async fn test_duplicate_tag_records_yield_one_entry_and_a_diagnostic() {
    use tourscout_feeds::StaticSource;

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;
    config.directory.replace_tour_data = true;

    let feed = r#"[
        {"tag": "lobby", "name": "Lobby East"},
        {"tag": "lobby", "name": "Lobby West"}
    ]"#;
    let service = service_with(config, hotel_graph())
        .with_directory_source(Arc::new(StaticSource::new(feed)));
    let report = built(&service).await;

    let index = service.current().unwrap();
    let lobby_entries: Vec<_> = index
        .entries()
        .iter()
        .filter(|e| e.label.to_lowercase().contains("lobby") && e.parent_label.is_none())
        .collect();
    assert_eq!(lobby_entries.len(), 1);
    assert_eq!(lobby_entries[0].label, "Lobby East");
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::DuplicateEntry));
}

// ============================================================================
// Scenario D: keyless sheet rows are dropped during normalization
// ============================================================================

#[tokio::test]
async fn test_keyless_sheet_row_does_not_reach_the_corpus() {
    use tourscout_feeds::StaticSource;

    let mut config = SearchConfig::with_defaults();
    config.sheet.enabled = true;
    config.standalone_entries = true;

    let sheet = "id,tag,name,description,imageurl,elementtype\n\
                 ,,,\"just a description\",,\n\
                 ,poolside,Pool Deck,,,\n";
    let service = service_with(config, hotel_graph())
        .with_sheet_source(Arc::new(StaticSource::new(sheet)));
    let report = built(&service).await;

    // Only the keyed row survives normalization.
    assert_eq!(report.records, 1);

    let index = service.current().unwrap();
    assert!(index.entries().iter().any(|e| e.label == "Pool Deck"));
    assert!(!index
        .entries()
        .iter()
        .any(|e| e.subtitle == "just a description" && e.label.is_empty()));
}

// ============================================================================
// Standalone entries and config conflicts
// ============================================================================

#[tokio::test]
async fn test_unmatched_records_need_standalone_opt_in() {
    use tourscout_feeds::StaticSource;

    let feed = r#"[{"id": "spa9", "name": "Day Spa"}]"#;

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;
    let service = service_with(config, hotel_graph())
        .with_directory_source(Arc::new(StaticSource::new(feed)));
    built(&service).await;
    let index = service.current().unwrap();
    assert!(!index.entries().iter().any(|e| e.label == "Day Spa"));

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;
    config.standalone_entries = true;
    let service = service_with(config, hotel_graph())
        .with_directory_source(Arc::new(StaticSource::new(feed)));
    built(&service).await;
    let index = service.current().unwrap();
    assert!(index.entries().iter().any(|e| e.label == "Day Spa"));
}

#[tokio::test]
async fn test_both_feeds_enabled_directory_wins() {
    use tourscout_feeds::StaticSource;

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;
    config.sheet.enabled = true;

    let service = service_with(config, hotel_graph())
        .with_directory_source(Arc::new(StaticSource::new("[]")))
        .with_sheet_source(Arc::new(StaticSource::new("id,name\nx,Should Not Appear\n")));
    let report = built(&service).await;

    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::ConfigConflict));
    // The sheet feed was disabled by normalization, so its rows never load.
    assert_eq!(report.records, 0);
}

// ============================================================================
// Degradation: feeds and hosts that fail must not fail the build
// ============================================================================

#[tokio::test]
async fn test_malformed_directory_feed_degrades_to_tour_only() {
    use tourscout_feeds::StaticSource;

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;

    let service = service_with(config, hotel_graph())
        .with_directory_source(Arc::new(StaticSource::new("{not json")));
    let report = built(&service).await;

    assert_eq!(report.records, 0);
    assert_eq!(report.entries, 5);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::FeedFailure));
}

#[tokio::test]
async fn test_empty_graph_builds_an_empty_index() {
    let service = service_with(SearchConfig::with_defaults(), json!({}));
    let report = built(&service).await;

    assert_eq!(report.entries, 0);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Traversal));

    let index = service.current().unwrap();
    assert!(index.search("anything").is_empty());
    assert!(index.get_all().is_empty());
}

// ============================================================================
// End-to-end search behavior
// ============================================================================

#[tokio::test]
async fn test_search_ranks_scene_above_its_children() {
    let service = service_with(SearchConfig::with_defaults(), hotel_graph());
    built(&service).await;

    let index = service.current().unwrap();
    let hits = index.search("lobby");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].label, "Lobby");
    assert!(hits[0].parent_label.is_none());
}

#[tokio::test]
async fn test_children_carry_their_parent_label() {
    let service = service_with(SearchConfig::with_defaults(), hotel_graph());
    built(&service).await;

    let index = service.current().unwrap();
    let desk = index
        .entries()
        .iter()
        .find(|e| e.label == "Front Desk")
        .expect("overlay child indexed");
    assert_eq!(desk.parent_label.as_deref(), Some("Lobby"));
    assert!(desk.boost < 1.0);
}

#[tokio::test]
async fn test_wildcard_returns_grouped_presentation_order() {
    use tourscout_scene::EntityType;

    let service = service_with(SearchConfig::with_defaults(), hotel_graph());
    built(&service).await;

    let index = service.current().unwrap();
    let all = index.search("*");
    assert_eq!(all.len(), 5);
    // Scene group renders before any overlay group.
    assert_eq!(all[0].kind, EntityType::Scene);
    let first_non_scene = all
        .iter()
        .position(|e| e.kind != EntityType::Scene)
        .unwrap();
    assert!(all[first_non_scene..]
        .iter()
        .all(|e| e.kind != EntityType::Scene));
}

#[tokio::test]
async fn test_rebuild_replaces_the_previous_corpus() {
    use tourscout_feeds::StaticSource;

    let mut config = SearchConfig::with_defaults();
    config.directory.enabled = true;
    config.directory.replace_tour_data = true;
    let service = service_with(config, hotel_graph()).with_directory_source(Arc::new(
        StaticSource::new(r#"[{"id": "rm001", "name": "Grand Lobby"}]"#),
    ));

    let first = built(&service).await;
    let mut tour_only = SearchConfig::with_defaults();
    tour_only.directory.enabled = false;
    service.update_config(tour_only);
    let second = built(&service).await;

    assert_ne!(first.build_id, second.build_id);
    let index = service.current().unwrap();
    assert!(index.entries().iter().any(|e| e.label == "Lobby"));
    assert!(!index.entries().iter().any(|e| e.label == "Grand Lobby"));
}
