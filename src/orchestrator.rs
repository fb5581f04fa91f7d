//! # Search Orchestrator
//! The cache-then-fan-out-scrape state machine:
//! `CacheCheck → (Hit | Miss) → [Fetching → Merging → Persisting] → Done`.
//!
//! Individual source failures are always downgraded to diagnostics; partial
//! results beat errors. Only a query with zero usable results across every
//! source surfaces as `success = false`, and such a result is never cached.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::fetch::{FetchError, Fetcher, RawCandidate};
use crate::normalize::normalize;
use crate::product::{ProductRecord, SearchResult, SourceId};
use crate::store::CacheStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("search_requests_total", "Search queries handled.");
        describe_counter!("search_cache_hits_total", "Queries answered from the cache.");
        describe_counter!(
            "search_cache_misses_total",
            "Queries that went to the fetchers."
        );
        describe_counter!(
            "search_fetch_errors_total",
            "Fetcher failures by source and kind."
        );
        describe_counter!(
            "search_products_total",
            "Normalized products kept, by source."
        );
        describe_histogram!(
            "search_fetch_duration_ms",
            "Per-source fetch time in milliseconds."
        );
        describe_gauge!("search_last_run_ts", "Unix ts of the last fetch fan-out.");
    });
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Cached results older than this are treated as a miss.
    pub cache_ttl: Duration,
    /// Wall-clock ceiling per source; one slow source never holds the query
    /// beyond this.
    pub per_source_timeout: Duration,
    pub max_results: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 3600),
            per_source_timeout: Duration::from_secs(300),
            max_results: 20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Skip the cache check and always fetch fresh.
    pub force_refresh: bool,
    /// Per-source result cap override.
    pub max_results: Option<usize>,
}

/// Where the answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache { age_secs: u64 },
    Fresh,
    /// Nothing usable; no document was produced.
    None,
}

impl Origin {
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Cache { .. } => "cache",
            Origin::Fresh => "fresh",
            Origin::None => "none",
        }
    }
}

/// One failed or empty source, kept for operator visibility. `kind` is the
/// error discriminant (`timeout`, `unrecognized`, `blocked`, `browser`) or
/// `no_results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDiagnostic {
    pub source: SourceId,
    pub kind: String,
    pub error: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub success: bool,
    pub query: String,
    pub origin: Origin,
    pub total_results: usize,
    pub by_source: BTreeMap<SourceId, Vec<ProductRecord>>,
    pub diagnostics: Vec<SourceDiagnostic>,
    pub warnings: Vec<String>,
    pub message: Option<String>,
}

struct SourceFetch {
    source: SourceId,
    outcome: Result<Vec<RawCandidate>, FetchError>,
    elapsed: Duration,
}

pub struct Orchestrator {
    store: Arc<dyn CacheStore>,
    fetchers: Vec<Arc<dyn Fetcher>>,
    cfg: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetchers: Vec<Arc<dyn Fetcher>>,
        cfg: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            fetchers,
            cfg,
        }
    }

    /// Recent cache documents for a query (backs the debug endpoint).
    pub async fn history(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, crate::store::CacheError> {
        self.store.history(query.trim(), limit).await
    }

    pub async fn search(&self, query: &str, opts: &SearchOptions) -> SearchOutcome {
        ensure_metrics_described();
        counter!("search_requests_total").increment(1);

        let query = query.trim().to_string();
        let mut warnings = Vec::new();
        let mut cache_writable = true;

        // CacheCheck: staleness is computed here at read time, never stored.
        if !opts.force_refresh {
            match self.store.find_latest(&query).await {
                Ok(Some(cached)) if !self.is_stale(&cached) => {
                    counter!("search_cache_hits_total").increment(1);
                    let age_secs = cached.age_secs(Utc::now());
                    info!(query = %query, age_secs, "cache hit");
                    return SearchOutcome {
                        success: true,
                        query,
                        origin: Origin::Cache { age_secs },
                        total_results: cached.total_count,
                        by_source: cached.by_source,
                        diagnostics: Vec::new(),
                        warnings,
                        message: None,
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(query = %query, error = %e, "cache lookup failed");
                    warnings
                        .push("cache store unavailable; results will not be persisted".to_string());
                    cache_writable = false;
                }
            }
        }
        counter!("search_cache_misses_total").increment(1);

        // Fetching: every source concurrently, each bounded by its own timeout.
        let max_results = opts.max_results.unwrap_or(self.cfg.max_results);
        let fetches = self.fetch_all(&query, max_results).await;
        gauge!("search_last_run_ts").set(Utc::now().timestamp().max(0) as f64);

        // Merging: normalize, drop records without signal, group by source.
        let mut by_source: BTreeMap<SourceId, Vec<ProductRecord>> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        for fetch in fetches {
            let elapsed_ms = fetch.elapsed.as_millis() as u64;
            histogram!("search_fetch_duration_ms", "source" => fetch.source.as_str())
                .record(elapsed_ms as f64);
            match fetch.outcome {
                Ok(raws) => {
                    let records: Vec<ProductRecord> = raws
                        .iter()
                        .filter_map(|raw| normalize(raw, fetch.source))
                        .collect();
                    counter!("search_products_total", "source" => fetch.source.as_str())
                        .increment(records.len() as u64);
                    if records.is_empty() {
                        diagnostics.push(SourceDiagnostic {
                            source: fetch.source,
                            kind: "no_results".to_string(),
                            error: "no usable candidates".to_string(),
                            elapsed_ms,
                        });
                    } else {
                        by_source.insert(fetch.source, records);
                    }
                }
                Err(e) => {
                    warn!(source = fetch.source.as_str(), error = %e, "fetcher failed");
                    counter!(
                        "search_fetch_errors_total",
                        "source" => fetch.source.as_str(),
                        "kind" => e.kind()
                    )
                    .increment(1);
                    diagnostics.push(SourceDiagnostic {
                        source: fetch.source,
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                        elapsed_ms,
                    });
                }
            }
        }

        let total: usize = by_source.values().map(Vec::len).sum();
        if total == 0 {
            // Never cache an empty result: the next attempt may succeed and
            // a poisoned entry would mask it for a whole TTL.
            info!(query = %query, "all sources failed or returned nothing");
            return SearchOutcome {
                success: false,
                query,
                origin: Origin::None,
                total_results: 0,
                by_source,
                diagnostics,
                warnings,
                message: Some("no products found from any source".to_string()),
            };
        }

        // Persisting: append-only; a fresh query always writes a new document.
        let result = SearchResult::new(query, by_source);
        if cache_writable {
            match self.store.insert(&result).await {
                Ok(id) => {
                    info!(query = %result.query, id = %id, total, "cached fresh result");
                }
                Err(e) => {
                    warn!(query = %result.query, error = %e, "cache write failed");
                    warnings.push(
                        "persisting results failed; response served without caching".to_string(),
                    );
                }
            }
        }

        SearchOutcome {
            success: true,
            query: result.query,
            origin: Origin::Fresh,
            total_results: result.total_count,
            by_source: result.by_source,
            diagnostics,
            warnings,
            message: None,
        }
    }

    fn is_stale(&self, cached: &SearchResult) -> bool {
        let age = Utc::now().signed_duration_since(cached.fetched_at);
        match chrono::Duration::from_std(self.cfg.cache_ttl) {
            Ok(ttl) => age > ttl,
            Err(_) => false,
        }
    }

    async fn fetch_all(&self, query: &str, max_results: usize) -> Vec<SourceFetch> {
        let mut set = JoinSet::new();
        for fetcher in &self.fetchers {
            let fetcher = Arc::clone(fetcher);
            let query = query.to_string();
            let per_source_timeout = self.cfg.per_source_timeout;
            set.spawn(async move {
                let started = Instant::now();
                let outcome =
                    match tokio::time::timeout(per_source_timeout, fetcher.fetch(&query, max_results))
                        .await
                    {
                        Ok(res) => res,
                        Err(_) => Err(FetchError::Timeout(per_source_timeout)),
                    };
                SourceFetch {
                    source: fetcher.source(),
                    outcome,
                    elapsed: started.elapsed(),
                }
            });
        }

        let mut fetches = Vec::with_capacity(self.fetchers.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(fetch) => fetches.push(fetch),
                Err(e) => warn!(error = %e, "fetch task panicked"),
            }
        }
        // Completion order is nondeterministic; keep diagnostics stable.
        fetches.sort_by_key(|f| f.source);
        fetches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn origin_labels() {
        assert_eq!(Origin::Cache { age_secs: 5 }.label(), "cache");
        assert_eq!(Origin::Fresh.label(), "fresh");
        assert_eq!(Origin::None.label(), "none");
    }

    #[tokio::test]
    async fn trims_query_before_cache_and_fetch() {
        let store = Arc::new(MemoryStore::default());
        let orchestrator = Orchestrator::new(store, Vec::new(), OrchestratorConfig::default());
        let outcome = orchestrator.search("  shoes  ", &SearchOptions::default()).await;
        assert_eq!(outcome.query, "shoes");
        assert!(!outcome.success);
    }
}
