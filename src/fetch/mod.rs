// src/fetch/mod.rs
pub mod browser;
pub mod extract;
pub mod providers;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::product::SourceId;

/// One result card as scraped, before normalization. Everything is optional
/// text: a missing field degrades to `None`, it never fails the fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCandidate {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price_text: Option<String>,
    pub list_price_text: Option<String>,
    pub rating_text: Option<String>,
    pub review_count_text: Option<String>,
    pub link: Option<String>,
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pub url: String,
    pub alt: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The page never reached a recognizable "results loaded" state.
    #[error("timed out after {0:?} waiting for results")]
    Timeout(Duration),
    /// The page loaded but the expected structural markers were absent,
    /// usually a site layout change.
    #[error("result page structure not recognized")]
    Unrecognized,
    /// The source actively rejected automated access; the fetcher needs
    /// maintenance, so this kind is surfaced distinctly.
    #[error("source blocked automated access: {0}")]
    Blocked(String),
    /// Browser session or transport fault.
    #[error("browser error: {0}")]
    Browser(String),
}

impl FetchError {
    /// Stable discriminant name for diagnostics and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Unrecognized => "unrecognized",
            FetchError::Blocked(_) => "blocked",
            FetchError::Browser(_) => "browser",
        }
    }
}

/// Capability contract for one external marketplace.
///
/// The orchestrator depends only on this trait; new sources are added by
/// implementing it, never by branching orchestrator code. Retries are an
/// orchestrator policy and do not belong inside an implementation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Scrape up to `max_results` raw candidates for `query`.
    ///
    /// Zero results on a recognized page is `Ok(vec![])`, not an error.
    async fn fetch(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RawCandidate>, FetchError>;

    fn source(&self) -> SourceId;
}
