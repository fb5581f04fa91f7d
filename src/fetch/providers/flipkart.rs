//! Flipkart search results fetcher.
//!
//! Flipkart rotates obfuscated class names between deploys, so each field
//! keeps the current and the previous generation of selectors. The lists
//! are configuration, expected to churn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::fetch::browser::{BrowserPool, PageState};
use crate::fetch::extract::{first_attr, first_text, select_items};
use crate::fetch::{FetchError, Fetcher, RawCandidate, RawImage};
use crate::product::SourceId;

const READY_SELECTOR: &str = "div#container";
const ITEM_SELECTORS: &[&str] = &["div[data-id]"];
const TITLE_SELECTORS: &[&str] = &["div.KzDlHZ", "a.wjcEIp", "div._4rR01T", "a.s1Q9rs"];
const BRAND_SELECTORS: &[&str] = &["div.syl9yP", "div._2WkVRV"];
const PRICE_SELECTORS: &[&str] = &["div.Nx9bqj", "div._30jeq3"];
const LIST_PRICE_SELECTORS: &[&str] = &["div.yRaY8j", "div._3I9_wc"];
const RATING_SELECTORS: &[&str] = &["div.XQDdHH", "div._3LWZlK"];
const REVIEWS_SELECTORS: &[&str] = &["span.Wphh3N", "span._2_R_DZ"];
const LINK_SELECTORS: &[&str] = &["a.CGtC98", "a._1fQZEK", "a.wjcEIp"];
const IMAGE_SELECTORS: &[&str] = &["img.DByuf4", "img._396cs4"];

const RESULTS_WAIT: Duration = Duration::from_secs(20);

pub struct FlipkartFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Browser(Arc<BrowserPool>),
}

impl FlipkartFetcher {
    pub fn with_pool(pool: Arc<BrowserPool>) -> Self {
        Self {
            mode: Mode::Browser(pool),
        }
    }

    pub fn from_fixture_str(html: &str) -> Self {
        Self {
            mode: Mode::Fixture(html.to_string()),
        }
    }

    fn search_url(query: &str) -> String {
        format!(
            "https://www.flipkart.com/search?q={}",
            urlencoding::encode(query)
        )
    }

    fn extract(html: &str, max_results: usize) -> Result<Vec<RawCandidate>, FetchError> {
        let doc = scraper::Html::parse_document(html);
        let items = select_items(&doc, ITEM_SELECTORS);
        if items.is_empty() {
            if html.contains("Are you a human") {
                return Err(FetchError::Blocked("bot check page".into()));
            }
            if html.contains("Sorry, no results found") {
                return Ok(Vec::new());
            }
            return Err(FetchError::Unrecognized);
        }

        let mut out = Vec::with_capacity(items.len().min(max_results));
        for item in items.into_iter().take(max_results) {
            let mut raw = RawCandidate {
                title: first_text(&item, TITLE_SELECTORS),
                brand: first_text(&item, BRAND_SELECTORS),
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
impl Fetcher for FlipkartFetcher {
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
                        if html.contains("Are you a human") {
                            Err(FetchError::Blocked("bot check page".into()))
                        } else {
                            Err(FetchError::Timeout(RESULTS_WAIT))
                        }
                    }
                }
            }
        }
    }

    fn source(&self) -> SourceId {
        SourceId::Flipkart
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_results_and_bot_check_are_distinct() {
        let empty = r#"<html><body><div>Sorry, no results found!</div></body></html>"#;
        assert_eq!(FlipkartFetcher::extract(empty, 10).unwrap(), vec![]);

        let blocked = r#"<html><body><h1>Are you a human?</h1></body></html>"#;
        assert!(matches!(
            FlipkartFetcher::extract(blocked, 10),
            Err(FetchError::Blocked(_))
        ));
    }

    #[test]
    fn cap_applies_before_field_extraction() {
        let html = r#"<html><body><div id="container">
            <div data-id="a"><div class="KzDlHZ">One</div><div class="Nx9bqj">₹100</div></div>
            <div data-id="b"><div class="KzDlHZ">Two</div><div class="Nx9bqj">₹200</div></div>
            <div data-id="c"><div class="KzDlHZ">Three</div><div class="Nx9bqj">₹300</div></div>
        </div></body></html>"#;
        let out = FlipkartFetcher::extract(html, 2).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].title.as_deref(), Some("Two"));
    }
}
