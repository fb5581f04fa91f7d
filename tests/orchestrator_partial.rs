// tests/orchestrator_partial.rs
//
// Partial-failure tolerance: slow, blocked, and broken sources degrade to
// diagnostics while the healthy ones still answer. A degraded cache store
// downgrades to a warning, never to a failed query.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use price_scout::fetch::{FetchError, Fetcher, RawCandidate};
use price_scout::orchestrator::{Orchestrator, OrchestratorConfig, Origin, SearchOptions};
use price_scout::product::{SearchResult, SourceId};
use price_scout::store::{CacheError, CacheStore, MemoryStore};

enum Behavior {
    Ok(Vec<RawCandidate>),
    Hang,
    Fail(fn() -> FetchError),
}

struct FakeFetcher {
    source: SourceId,
    behavior: Behavior,
}

impl FakeFetcher {
    fn ok(source: SourceId, titles: &[&str]) -> Arc<dyn Fetcher> {
        let candidates = titles
            .iter()
            .map(|t| RawCandidate {
                title: Some((*t).to_string()),
                price_text: Some("₹999".to_string()),
                ..RawCandidate::default()
            })
            .collect();
        Arc::new(Self {
            source,
            behavior: Behavior::Ok(candidates),
        })
    }

    fn hanging(source: SourceId) -> Arc<dyn Fetcher> {
        Arc::new(Self {
            source,
            behavior: Behavior::Hang,
        })
    }

    fn failing(source: SourceId, make: fn() -> FetchError) -> Arc<dyn Fetcher> {
        Arc::new(Self {
            source,
            behavior: Behavior::Fail(make),
        })
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<RawCandidate>, FetchError> {
        match &self.behavior {
            Behavior::Ok(candidates) => Ok(candidates.clone()),
            Behavior::Hang => {
                // Far beyond any per-source timeout used in these tests.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            Behavior::Fail(make) => Err(make()),
        }
    }

    fn source(&self) -> SourceId {
        self.source
    }
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        cache_ttl: Duration::from_secs(24 * 3600),
        per_source_timeout: Duration::from_millis(200),
        max_results: 10,
    }
}

#[tokio::test]
async fn two_of_four_sources_failing_still_succeeds() {
    let store = Arc::new(MemoryStore::default());
    let orchestrator = Orchestrator::new(
        store.clone(),
        vec![
            FakeFetcher::ok(SourceId::Amazon, &["Shoe X", "Shoe Y"]),
            FakeFetcher::ok(SourceId::Flipkart, &["Shoe Z"]),
            FakeFetcher::hanging(SourceId::Meesho),
            FakeFetcher::hanging(SourceId::Myntra),
        ],
        config(),
    );

    let outcome = orchestrator.search("shoes", &SearchOptions::default()).await;
    assert!(outcome.success);
    assert_eq!(outcome.total_results, 3);
    assert_eq!(outcome.by_source.len(), 2);
    assert!(outcome.by_source.contains_key(&SourceId::Amazon));
    assert!(outcome.by_source.contains_key(&SourceId::Flipkart));

    // Both slow sources show up as timeouts, by name.
    let timeouts: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.kind == "timeout")
        .collect();
    assert_eq!(timeouts.len(), 2);
    assert!(timeouts.iter().any(|d| d.source == SourceId::Meesho));
    assert!(timeouts.iter().any(|d| d.source == SourceId::Myntra));

    // Partial success is still worth caching.
    assert!(store.find_latest("shoes").await.unwrap().is_some());
}

#[tokio::test]
async fn blocked_source_is_surfaced_distinctly() {
    let orchestrator = Orchestrator::new(
        Arc::new(MemoryStore::default()),
        vec![
            FakeFetcher::ok(SourceId::Amazon, &["Shoe X"]),
            FakeFetcher::failing(SourceId::Flipkart, || {
                FetchError::Blocked("bot check page".into())
            }),
            FakeFetcher::failing(SourceId::Myntra, || FetchError::Unrecognized),
        ],
        config(),
    );

    let outcome = orchestrator.search("shoes", &SearchOptions::default()).await;
    assert!(outcome.success);
    assert_eq!(outcome.total_results, 1);

    let kinds: Vec<&str> = outcome.diagnostics.iter().map(|d| d.kind.as_str()).collect();
    assert!(kinds.contains(&"blocked"));
    assert!(kinds.contains(&"unrecognized"));
}

#[tokio::test]
async fn all_sources_failing_is_unsuccessful_with_diagnostics() {
    let store = Arc::new(MemoryStore::default());
    let orchestrator = Orchestrator::new(
        store.clone(),
        vec![
            FakeFetcher::hanging(SourceId::Amazon),
            FakeFetcher::failing(SourceId::Flipkart, || FetchError::Unrecognized),
        ],
        config(),
    );

    let outcome = orchestrator.search("shoes", &SearchOptions::default()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.origin, Origin::None);
    assert_eq!(outcome.diagnostics.len(), 2);
    assert!(store.find_latest("shoes").await.unwrap().is_none());
}

/// Store that is down for reads and writes.
struct UnavailableStore;

#[async_trait]
impl CacheStore for UnavailableStore {
    async fn find_latest(&self, _query: &str) -> Result<Option<SearchResult>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn insert(&self, _result: &SearchResult) -> Result<String, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn history(&self, _query: &str, _limit: usize) -> Result<Vec<SearchResult>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn unavailable_cache_degrades_to_warning_not_failure() {
    let orchestrator = Orchestrator::new(
        Arc::new(UnavailableStore),
        vec![FakeFetcher::ok(SourceId::Amazon, &["Shoe X"])],
        config(),
    );

    let outcome = orchestrator.search("shoes", &SearchOptions::default()).await;
    assert!(outcome.success);
    assert_eq!(outcome.total_results, 1);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.contains("will not be persisted")));
}
