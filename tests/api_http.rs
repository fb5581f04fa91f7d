// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /search parameter validation
// - GET /search end-to-end: one mock source answers, one times out
// - GET /debug/history

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use price_scout::api::{self, AppState};
use price_scout::fetch::{FetchError, Fetcher, RawCandidate};
use price_scout::orchestrator::{Orchestrator, OrchestratorConfig};
use price_scout::product::SourceId;
use price_scout::store::MemoryStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

struct MockFetcher {
    source: SourceId,
    candidates: Vec<RawCandidate>,
    hang: bool,
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<RawCandidate>, FetchError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self.candidates.clone())
    }

    fn source(&self) -> SourceId {
        self.source
    }
}

/// Build the same Router the binary uses: mock source A answers with one
/// shoe, mock source B never becomes ready.
fn test_router() -> Router {
    let fetcher_a = Arc::new(MockFetcher {
        source: SourceId::Amazon,
        candidates: vec![RawCandidate {
            title: Some("Shoe X".to_string()),
            price_text: Some("₹1,299".to_string()),
            ..RawCandidate::default()
        }],
        hang: false,
    });
    let fetcher_b = Arc::new(MockFetcher {
        source: SourceId::Myntra,
        candidates: Vec::new(),
        hang: true,
    });
    let cfg = OrchestratorConfig {
        cache_ttl: Duration::from_secs(24 * 3600),
        per_source_timeout: Duration::from_millis(200),
        max_results: 10,
    };
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(MemoryStore::default()),
        vec![fetcher_a as Arc<dyn Fetcher>, fetcher_b as Arc<dyn Fetcher>],
        cfg,
    ));
    api::router(AppState { orchestrator })
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let value = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, value)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "OK", "health body should be 'OK'");
}

#[tokio::test]
async fn api_search_without_query_is_400() {
    let app = test_router();

    let (status, v) = get_json(&app, "/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["success"], false);

    let (status, _) = get_json(&app, "/search?query=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "blank query should be 400");
}

#[tokio::test]
async fn api_search_end_to_end_with_partial_source_failure() {
    let app = test_router();

    let (status, v) = get_json(&app, "/search?query=shoes").await;
    assert_eq!(status, StatusCode::OK, "partial failure is still a 200");
    assert_eq!(v["success"], true);
    assert_eq!(v["query"], "shoes");
    assert_eq!(v["total_results"], 1);
    assert_eq!(v["source"], "fresh");

    // The healthy source's products, normalized.
    assert_eq!(v["results"][0]["source"], "amazon");
    assert_eq!(v["results"][0]["total_count"], 1);
    let product = &v["results"][0]["products"][0];
    assert_eq!(product["name"], "Shoe X");
    assert_eq!(product["price"]["amount"], 1299.0);
    assert_eq!(product["price"]["currency"], "INR");

    // The slow source shows up in diagnostics by name and kind.
    let diagnostics = v["diagnostics"].as_array().expect("diagnostics array");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["source"], "myntra");
    assert_eq!(diagnostics[0]["kind"], "timeout");
}

#[tokio::test]
async fn api_search_second_call_is_served_from_cache() {
    let app = test_router();

    let (_, first) = get_json(&app, "/search?query=shoes").await;
    assert_eq!(first["source"], "fresh");

    let (status, second) = get_json(&app, "/search?query=shoes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["source"], "cache");
    assert_eq!(second["total_results"], 1);
    assert!(second["cache_age_secs"].is_u64(), "cache age annotated");
    // A hit carries no fetch diagnostics.
    assert_eq!(second["diagnostics"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn api_debug_history_lists_persisted_documents() {
    let app = test_router();

    let _ = get_json(&app, "/search?query=shoes").await;
    let _ = get_json(&app, "/search?query=shoes&force_refresh=true").await;

    let (status, v) = get_json(&app, "/debug/history?query=shoes").await;
    assert_eq!(status, StatusCode::OK);
    let rows = v.as_array().expect("history array");
    assert_eq!(rows.len(), 2, "append-only: both documents retrievable");
    assert_eq!(rows[0]["query"], "shoes");
    assert_eq!(rows[0]["total_count"], 1);
    assert_eq!(rows[0]["sources"][0], "amazon");
}
