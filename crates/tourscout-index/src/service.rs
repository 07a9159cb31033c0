//! Build orchestration.
//!
//! One [`IndexService`] owns the whole pipeline. A build is a single
//! non-preemptible pass: wait for the host, settle both feed fetches,
//! then run the synchronous reconciliation over materialized lists. Only
//! one build is ever in flight; a request arriving mid-build sets a
//! pending flag and is coalesced into exactly one follow-up build (the
//! matcher's consumed-key sets are mutated in place and are not safe for
//! interleaving). Any reconfiguration discards the previous corpus and
//! reruns everything; there is no incremental path.

use crate::{MatchingEngine, SearchIndex};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tourscout_feeds::{normalize_directory, normalize_sheet, FeedSource, SheetOptions};
use tourscout_reconcile::{
    build_corpus, Diagnostic, DiagnosticKind, IndexBuildContext, SearchConfig,
};
use tourscout_scene::SceneWalker;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// Host Binding
// ============================================================================

/// How the service reaches the host's scene graph. The host loads
/// asynchronously, so a snapshot may be absent for a while after startup.
pub trait HostBinding: Send + Sync {
    fn snapshot(&self) -> Option<Value>;
}

/// A host whose graph is already materialized; used by the CLI and tests.
pub struct StaticHost {
    graph: Value,
}

impl StaticHost {
    pub fn new(graph: Value) -> Self {
        Self { graph }
    }
}

impl HostBinding for StaticHost {
    fn snapshot(&self) -> Option<Value> {
        Some(self.graph.clone())
    }
}

/// One idempotent readiness check over a host snapshot.
pub struct ReadinessProbe {
    pub name: &'static str,
    pub check: fn(&Value) -> bool,
}

/// Ranked readiness probes, tried in order against each snapshot. The
/// host is ready as soon as any probe passes.
pub const READINESS_PROBES: &[ReadinessProbe] = &[
    ReadinessProbe {
        name: "main-container",
        check: |graph| graph.get("main").map(Value::is_object).unwrap_or(false),
    },
    ReadinessProbe {
        name: "detail-container",
        check: |graph| graph.get("detail").map(Value::is_object).unwrap_or(false),
    },
    ReadinessProbe {
        name: "bare-scene-list",
        check: |graph| {
            graph
                .get("scenes")
                .or_else(|| graph.get("items"))
                .map(Value::is_array)
                .unwrap_or(false)
        },
    },
];

const READY_ATTEMPTS: u32 = 5;
const READY_BACKOFF: Duration = Duration::from_millis(100);

/// Poll the host until a readiness probe passes, with bounded retries and
/// linear backoff. `None` means the host never became ready; the build
/// then degrades to an empty corpus.
async fn await_host(host: &dyn HostBinding) -> Option<Value> {
    for attempt in 0..READY_ATTEMPTS {
        if let Some(snapshot) = host.snapshot() {
            if let Some(probe) = READINESS_PROBES.iter().find(|p| (p.check)(&snapshot)) {
                debug!(probe = probe.name, attempt, "host ready");
                return Some(snapshot);
            }
        }
        tokio::time::sleep(READY_BACKOFF * (attempt + 1)).await;
    }
    None
}

// ============================================================================
// Build Reports
// ============================================================================

/// Summary of one finished build.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildReport {
    pub build_id: Uuid,
    pub entities: usize,
    pub records: usize,
    pub entries: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// What happened to a rebuild request.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// This call ran the build (including any coalesced follow-ups).
    Built(BuildReport),
    /// A build was already in flight; one follow-up was scheduled.
    Deferred,
}

#[derive(Default)]
struct FlightState {
    in_flight: bool,
    pending: bool,
}

// ============================================================================
// Index Service
// ============================================================================

/// Owns the current search index and rebuilds it wholesale on demand.
pub struct IndexService {
    host: Arc<dyn HostBinding>,
    engine: Arc<dyn MatchingEngine>,
    directory_source: Option<Arc<dyn FeedSource>>,
    sheet_source: Option<Arc<dyn FeedSource>>,
    config: Mutex<SearchConfig>,
    flight: Mutex<FlightState>,
    current: RwLock<Option<Arc<SearchIndex>>>,
}

impl IndexService {
    pub fn new(
        config: SearchConfig,
        host: Arc<dyn HostBinding>,
        engine: Arc<dyn MatchingEngine>,
    ) -> Self {
        Self {
            host,
            engine,
            directory_source: None,
            sheet_source: None,
            config: Mutex::new(config),
            flight: Mutex::new(FlightState::default()),
            current: RwLock::new(None),
        }
    }

    pub fn with_directory_source(mut self, source: Arc<dyn FeedSource>) -> Self {
        self.directory_source = Some(source);
        self
    }

    pub fn with_sheet_source(mut self, source: Arc<dyn FeedSource>) -> Self {
        self.sheet_source = Some(source);
        self
    }

    /// The most recently finished index, if any build has completed.
    pub fn current(&self) -> Option<Arc<SearchIndex>> {
        self.current.read().clone()
    }

    /// Replace the configuration. The previous corpus is invalid from this
    /// point; call [`IndexService::rebuild`] to produce the new one.
    pub fn update_config(&self, config: SearchConfig) {
        *self.config.lock() = config;
    }

    /// Run a full index build, coalescing requests that arrive mid-build.
    pub async fn rebuild(&self) -> BuildOutcome {
        {
            let mut flight = self.flight.lock();
            if flight.in_flight {
                flight.pending = true;
                debug!("build already in flight; request deferred");
                return BuildOutcome::Deferred;
            }
            flight.in_flight = true;
        }

        loop {
            let report = self.run_build().await;
            let rerun = {
                let mut flight = self.flight.lock();
                if flight.pending {
                    flight.pending = false;
                    true
                } else {
                    flight.in_flight = false;
                    false
                }
            };
            if !rerun {
                return BuildOutcome::Built(report);
            }
            debug!("coalesced build request; rerunning");
        }
    }

    /// One complete, non-preemptible build pass.
    async fn run_build(&self) -> BuildReport {
        let config = self.config.lock().clone();
        let mut ctx = IndexBuildContext::new(config);
        let timeout = Duration::from_secs(ctx.config.feed_timeout_secs);

        // Both feed fetches settle concurrently; failure and timeout both
        // degrade that feed to "no external data".
        let directory_enabled = ctx.config.directory.enabled;
        let sheet_enabled = ctx.config.sheet.enabled;
        let (directory_body, sheet_body) = tokio::join!(
            fetch_feed(
                directory_enabled,
                self.directory_source.as_deref(),
                ctx.config.directory.url.as_deref(),
                timeout
            ),
            fetch_feed(
                sheet_enabled,
                self.sheet_source.as_deref(),
                ctx.config.sheet.url.as_deref(),
                timeout
            ),
        );

        let mut records = Vec::new();
        match directory_body {
            FeedBody::Fetched(body) => match normalize_directory(&body) {
                Ok(mut recs) => records.append(&mut recs),
                Err(err) => ctx.warn(
                    DiagnosticKind::FeedFailure,
                    format!("directory feed unusable: {err}"),
                ),
            },
            FeedBody::Failed(reason) => ctx.warn(
                DiagnosticKind::FeedFailure,
                format!("directory feed failed: {reason}"),
            ),
            FeedBody::Absent => {}
        }
        match sheet_body {
            FeedBody::Fetched(body) => {
                let options = SheetOptions {
                    delimiter: ctx.config.sheet.delimiter,
                    has_header: ctx.config.sheet.has_header,
                    auto_type: ctx.config.sheet.auto_type,
                };
                match normalize_sheet(&body, &options) {
                    Ok(mut recs) => records.append(&mut recs),
                    Err(err) => ctx.warn(
                        DiagnosticKind::FeedFailure,
                        format!("sheet feed unusable: {err}"),
                    ),
                }
            }
            FeedBody::Failed(reason) => ctx.warn(
                DiagnosticKind::FeedFailure,
                format!("sheet feed failed: {reason}"),
            ),
            FeedBody::Absent => {}
        }

        let entities = match await_host(&*self.host).await {
            Some(graph) => SceneWalker::new(&graph).walk(),
            None => {
                ctx.warn(
                    DiagnosticKind::Traversal,
                    "host never became ready; building empty corpus",
                );
                Vec::new()
            }
        };
        if entities.is_empty() {
            ctx.warn(
                DiagnosticKind::Traversal,
                "no navigable entities discovered",
            );
        }

        let corpus = build_corpus(&entities, &records, &mut ctx);
        let index = Arc::new(SearchIndex::build(corpus, &ctx.config, self.engine.clone()));

        let report = BuildReport {
            build_id: ctx.build_id,
            entities: entities.len(),
            records: records.len(),
            entries: index.len(),
            diagnostics: ctx.diagnostics().to_vec(),
        };
        info!(
            build = %report.build_id,
            entities = report.entities,
            records = report.records,
            entries = report.entries,
            "index build finished"
        );

        *self.current.write() = Some(index);
        report
    }

    #[cfg(test)]
    fn force_in_flight(&self, value: bool) {
        self.flight.lock().in_flight = value;
    }

    #[cfg(test)]
    fn flight_pending(&self) -> bool {
        self.flight.lock().pending
    }
}

enum FeedBody {
    Fetched(String),
    Failed(String),
    Absent,
}

/// Resolve one feed to a body. An injected source wins; otherwise the
/// configured URL is fetched over HTTP when that support is compiled in.
/// A feed that is enabled but unreachable never stays silent.
async fn fetch_feed(
    enabled: bool,
    source: Option<&dyn FeedSource>,
    url: Option<&str>,
    deadline: Duration,
) -> FeedBody {
    if !enabled {
        return FeedBody::Absent;
    }
    if let Some(source) = source {
        return fetch_from(source, deadline).await;
    }
    match url {
        #[cfg(feature = "http")]
        Some(url) => {
            let source = tourscout_feeds::HttpSource::new(url);
            fetch_from(&source, deadline).await
        }
        #[cfg(not(feature = "http"))]
        Some(url) => FeedBody::Failed(format!(
            "url {url} configured but http support is not compiled in"
        )),
        None => FeedBody::Failed("enabled without a source or url".to_string()),
    }
}

async fn fetch_from(source: &dyn FeedSource, deadline: Duration) -> FeedBody {
    match tokio::time::timeout(deadline, source.fetch()).await {
        Ok(Ok(body)) => FeedBody::Fetched(body),
        Ok(Err(err)) => FeedBody::Failed(format!("{} ({err})", source.describe())),
        Err(_) => FeedBody::Failed(format!("{} (deadline exceeded)", source.describe())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimilarityEngine;
    use async_trait::async_trait;
    use serde_json::json;
    use tourscout_feeds::{FeedError, StaticSource};

    fn graph() -> Value {
        json!({
            "main": {"scenes": [
                {"id": "rm001", "class": "Panorama", "label": "Lobby", "tags": ["lobby"]},
                {"id": "rm002", "class": "Panorama", "label": "Cafe"}
            ]}
        })
    }

    fn service(config: SearchConfig) -> IndexService {
        IndexService::new(
            config,
            Arc::new(StaticHost::new(graph())),
            Arc::new(SimilarityEngine),
        )
    }

    struct FailingSource;

    #[async_trait]
    impl FeedSource for FailingSource {
        async fn fetch(&self) -> Result<String, FeedError> {
            Err(FeedError::Io(std::io::Error::other("boom")))
        }
        fn describe(&self) -> String {
            "failing".into()
        }
    }

    struct HangingSource;

    #[async_trait]
    impl FeedSource for HangingSource {
        async fn fetch(&self) -> Result<String, FeedError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
        fn describe(&self) -> String {
            "hanging".into()
        }
    }

    #[tokio::test]
    async fn build_without_feeds_indexes_tour_entities() {
        let service = service(SearchConfig::with_defaults());
        let outcome = service.rebuild().await;
        let report = match outcome {
            BuildOutcome::Built(report) => report,
            BuildOutcome::Deferred => panic!("nothing else was in flight"),
        };
        assert_eq!(report.entities, 2);
        assert_eq!(report.entries, 2);

        let index = service.current().expect("index published");
        assert_eq!(index.search("lobby").len(), 1);
    }

    #[tokio::test]
    async fn directory_feed_enhances_matches() {
        let mut config = SearchConfig::with_defaults();
        config.directory.enabled = true;
        config.directory.replace_tour_data = true;

        let feed = r#"[{"id": "rm001", "name": "Grand Lobby", "description": "Marble"}]"#;
        let service = service(config).with_directory_source(Arc::new(StaticSource::new(feed)));
        service.rebuild().await;

        let index = service.current().unwrap();
        let hits = index.search("grand");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "Grand Lobby");
    }

    #[tokio::test]
    async fn failed_feed_degrades_to_tour_only() {
        let mut config = SearchConfig::with_defaults();
        config.directory.enabled = true;

        let service = service(config).with_directory_source(Arc::new(FailingSource));
        let outcome = service.rebuild().await;
        let report = match outcome {
            BuildOutcome::Built(report) => report,
            BuildOutcome::Deferred => panic!("nothing else was in flight"),
        };
        assert_eq!(report.records, 0);
        assert_eq!(report.entries, 2);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::FeedFailure));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_feed_hits_the_deadline() {
        let mut config = SearchConfig::with_defaults();
        config.directory.enabled = true;
        config.feed_timeout_secs = 5;

        let service = service(config).with_directory_source(Arc::new(HangingSource));
        let outcome = service.rebuild().await;
        let report = match outcome {
            BuildOutcome::Built(report) => report,
            BuildOutcome::Deferred => panic!("nothing else was in flight"),
        };
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::FeedFailure
                && d.message.contains("deadline exceeded")));
        assert_eq!(report.entries, 2);
    }

    #[cfg(not(feature = "http"))]
    #[tokio::test]
    async fn url_only_feed_without_http_support_degrades_loudly() {
        let mut config = SearchConfig::with_defaults();
        config.directory.enabled = true;
        config.directory.url = Some("https://example.com/rooms.json".into());

        let service = service(config);
        let report = match service.rebuild().await {
            BuildOutcome::Built(report) => report,
            BuildOutcome::Deferred => panic!("nothing else was in flight"),
        };
        assert_eq!(report.records, 0);
        assert_eq!(report.entries, 2);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::FeedFailure
                && d.message.contains("http support")));
    }

    #[tokio::test]
    async fn enabled_feed_without_source_or_url_warns() {
        let mut config = SearchConfig::with_defaults();
        config.sheet.enabled = true;

        let service = service(config);
        let report = match service.rebuild().await {
            BuildOutcome::Built(report) => report,
            BuildOutcome::Deferred => panic!("nothing else was in flight"),
        };
        assert_eq!(report.entries, 2);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::FeedFailure
                && d.message.contains("without a source or url")));
    }

    #[tokio::test]
    async fn request_during_build_is_deferred_then_coalesced() {
        let service = service(SearchConfig::with_defaults());
        service.force_in_flight(true);
        assert!(matches!(service.rebuild().await, BuildOutcome::Deferred));
        assert!(service.flight_pending());

        // The next owner of the flight lock drains the pending flag by
        // running exactly one follow-up pass.
        service.force_in_flight(false);
        assert!(matches!(service.rebuild().await, BuildOutcome::Built(_)));
        assert!(!service.flight_pending());
    }

    #[tokio::test]
    async fn empty_host_builds_empty_index() {
        let service = IndexService::new(
            SearchConfig::with_defaults(),
            Arc::new(StaticHost::new(json!({}))),
            Arc::new(SimilarityEngine),
        );
        let outcome = service.rebuild().await;
        let report = match outcome {
            BuildOutcome::Built(report) => report,
            BuildOutcome::Deferred => panic!("nothing else was in flight"),
        };
        assert_eq!(report.entries, 0);
        let index = service.current().unwrap();
        assert!(index.search("anything").is_empty());
    }
}
