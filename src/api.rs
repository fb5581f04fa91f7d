//! HTTP facade: thin request/response mapping onto the orchestrator.
//!
//! Non-2xx only for a missing/blank query parameter or an internal fault;
//! partial source failure is still a 200 with diagnostics embedded.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::orchestrator::{Orchestrator, Origin, SearchOptions, SearchOutcome, SourceDiagnostic};
use crate::product::{ProductRecord, SourceId};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/search", get(search))
        .route("/debug/history", get(debug_history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
    #[serde(default)]
    force_refresh: bool,
    max_results: Option<usize>,
}

#[derive(Serialize)]
struct SourceResults {
    source: SourceId,
    total_count: usize,
    products: Vec<ProductRecord>,
}

#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    query: String,
    total_results: usize,
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_age_secs: Option<u64>,
    results: Vec<SourceResults>,
    diagnostics: Vec<SourceDiagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        let cache_age_secs = match outcome.origin {
            Origin::Cache { age_secs } => Some(age_secs),
            _ => None,
        };
        let results = outcome
            .by_source
            .into_iter()
            .map(|(source, products)| SourceResults {
                source,
                total_count: products.len(),
                products,
            })
            .collect();
        Self {
            success: outcome.success,
            query: outcome.query,
            total_results: outcome.total_results,
            source: outcome.origin.label(),
            cache_age_secs,
            results,
            diagnostics: outcome.diagnostics,
            warnings: outcome.warnings,
            message: outcome.message,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

fn bad_request(msg: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            success: false,
            error: msg.to_string(),
        }),
    )
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ErrorBody>)> {
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(bad_request("missing or empty 'query' parameter"));
    }
    let opts = SearchOptions {
        force_refresh: params.force_refresh,
        max_results: params.max_results,
    };
    let outcome = state.orchestrator.search(query, &opts).await;
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
struct HistoryParams {
    query: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HistoryRow {
    query: String,
    fetched_at: chrono::DateTime<chrono::Utc>,
    total_count: usize,
    sources: Vec<SourceId>,
}

async fn debug_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryRow>>, (StatusCode, Json<ErrorBody>)> {
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(bad_request("missing or empty 'query' parameter"));
    }
    let rows = state
        .orchestrator
        .history(query, params.limit.unwrap_or(10))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    success: false,
                    error: e.to_string(),
                }),
            )
        })?;
    let out = rows
        .into_iter()
        .map(|r| HistoryRow {
            query: r.query,
            fetched_at: r.fetched_at,
            total_count: r.total_count,
            sources: r.by_source.keys().copied().collect(),
        })
        .collect();
    Ok(Json(out))
}
