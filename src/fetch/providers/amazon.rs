//! Amazon.in search results fetcher.
//!
//! Navigation and readiness detection run in a pooled browser session; the
//! extraction itself is a pure function over the rendered HTML so fixture
//! tests can drive it without a browser.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::fetch::browser::{BrowserPool, PageState};
use crate::fetch::extract::{doc_has, first_attr, first_text, select_items};
use crate::fetch::{FetchError, Fetcher, RawCandidate, RawImage};
use crate::product::SourceId;

/// Results grid root; its presence means the page finished rendering.
const READY_SELECTOR: &str = "div.s-main-slot";
const ITEM_SELECTORS: &[&str] = &[
    "div[data-component-type='s-search-result']",
    "div.s-result-item[data-asin]",
];
const TITLE_SELECTORS: &[&str] = &["h2 a span", "h2 span"];
const PRICE_SELECTORS: &[&str] = &["span.a-price:not(.a-text-price) span.a-offscreen"];
const LIST_PRICE_SELECTORS: &[&str] = &["span.a-price.a-text-price span.a-offscreen"];
const RATING_SELECTORS: &[&str] = &["span.a-icon-alt"];
const REVIEWS_SELECTORS: &[&str] = &["span.a-size-base.s-underline-text"];
const LINK_SELECTORS: &[&str] = &["h2 a", "a.a-link-normal.s-no-outline"];
const IMAGE_SELECTORS: &[&str] = &["img.s-image"];
/// Captcha interstitial markers.
const BLOCKED_SELECTORS: &[&str] = &["form[action*='validateCaptcha']", "input#captchacharacters"];

const RESULTS_WAIT: Duration = Duration::from_secs(20);

pub struct AmazonFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Browser(Arc<BrowserPool>),
}

impl AmazonFetcher {
    pub fn with_pool(pool: Arc<BrowserPool>) -> Self {
        Self {
            mode: Mode::Browser(pool),
        }
    }

    /// Run extraction over captured markup instead of a live session.
    pub fn from_fixture_str(html: &str) -> Self {
        Self {
            mode: Mode::Fixture(html.to_string()),
        }
    }

    fn search_url(query: &str) -> String {
        format!("https://www.amazon.in/s?k={}", urlencoding::encode(query))
    }

    fn extract(html: &str, max_results: usize) -> Result<Vec<RawCandidate>, FetchError> {
        let doc = scraper::Html::parse_document(html);
        let items = select_items(&doc, ITEM_SELECTORS);
        if items.is_empty() {
            if doc_has(&doc, BLOCKED_SELECTORS) {
                return Err(FetchError::Blocked("captcha interstitial".into()));
            }
            if html.contains("did not match any products") || html.contains("No results for") {
                return Ok(Vec::new());
            }
            return Err(FetchError::Unrecognized);
        }

        let mut out = Vec::with_capacity(items.len().min(max_results));
        for item in items.into_iter().take(max_results) {
            let mut raw = RawCandidate {
                title: first_text(&item, TITLE_SELECTORS),
                price_text: first_text(&item, PRICE_SELECTORS),
                list_price_text: first_text(&item, LIST_PRICE_SELECTORS),
                rating_text: first_text(&item, RATING_SELECTORS),
                review_count_text: first_text(&item, REVIEWS_SELECTORS),
                link: first_attr(&item, LINK_SELECTORS, "href"),
                ..RawCandidate::default()
            };
            if let Some(url) = first_attr(&item, IMAGE_SELECTORS, "src") {
                raw.images.push(RawImage {
                    url,
                    alt: first_attr(&item, IMAGE_SELECTORS, "alt"),
                });
            }
            out.push(raw);
        }
        Ok(out)
    }
}

#[async_trait]
impl Fetcher for AmazonFetcher {
    async fn fetch(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RawCandidate>, FetchError> {
        match &self.mode {
            Mode::Fixture(html) => Self::extract(html, max_results),
            Mode::Browser(pool) => {
                let session = pool.acquire().await?;
                let url = Self::search_url(query);
                match session
                    .html_when_ready(&url, READY_SELECTOR, RESULTS_WAIT)
                    .await?
                {
                    PageState::Ready(html) => Self::extract(&html, max_results),
                    PageState::TimedOut(html) => {
                        let doc = scraper::Html::parse_document(&html);
                        if doc_has(&doc, BLOCKED_SELECTORS) {
                            Err(FetchError::Blocked("captcha interstitial".into()))
                        } else {
                            Err(FetchError::Timeout(RESULTS_WAIT))
                        }
                    }
                }
            }
        }
    }

    fn source(&self) -> SourceId {
        SourceId::Amazon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_is_encoded() {
        assert_eq!(
            AmazonFetcher::search_url("running shoes"),
            "https://www.amazon.in/s?k=running%20shoes"
        );
    }

    #[test]
    fn blocked_page_is_classified() {
        let html = r#"<html><body><form action="/errors/validateCaptcha"></form></body></html>"#;
        assert!(matches!(
            AmazonFetcher::extract(html, 10),
            Err(FetchError::Blocked(_))
        ));
    }

    #[test]
    fn empty_results_page_is_ok_not_error() {
        let html = r#"<html><body><span>No results for "qwertyuiop".</span></body></html>"#;
        assert_eq!(AmazonFetcher::extract(html, 10).unwrap(), vec![]);
    }

    #[test]
    fn unknown_markup_is_unrecognized() {
        assert!(matches!(
            AmazonFetcher::extract("<html><body><p>hello</p></body></html>", 10),
            Err(FetchError::Unrecognized)
        ));
    }
}
