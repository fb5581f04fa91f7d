//! Meesho search results fetcher.
//!
//! Meesho renders styled-component class names, so matching leans on
//! attribute substrings and the card anchor itself rather than exact
//! classes. MRP is not shown on result cards; `list_price_text` stays
//! `None` and the record simply carries no discount.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::fetch::browser::{BrowserPool, PageState};
use crate::fetch::extract::{first_attr, first_text, own_attr, select_items};
use crate::fetch::{FetchError, Fetcher, RawCandidate, RawImage};
use crate::product::SourceId;

const READY_SELECTOR: &str = "a[href*='/p/']";
/// Result cards are anchors onto the product page.
const ITEM_SELECTORS: &[&str] = &["a[href*='/p/']"];
const TITLE_SELECTORS: &[&str] = &["p[class*='StyledDesktopProductTitle']", "p"];
const PRICE_SELECTORS: &[&str] = &["h5"];
const RATING_SELECTORS: &[&str] = &["span[class*='Rating__StyledPill']", "span[class*='Rating']"];
const REVIEWS_SELECTORS: &[&str] = &["span[class*='RatingCount']"];
const IMAGE_SELECTORS: &[&str] = &["img"];

const RESULTS_WAIT: Duration = Duration::from_secs(20);

pub struct MeeshoFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Browser(Arc<BrowserPool>),
}

impl MeeshoFetcher {
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
            "https://www.meesho.com/search?q={}",
            urlencoding::encode(query)
        )
    }

    fn extract(html: &str, max_results: usize) -> Result<Vec<RawCandidate>, FetchError> {
        let doc = scraper::Html::parse_document(html);
        let items = select_items(&doc, ITEM_SELECTORS);
        if items.is_empty() {
            if html.contains("Access Denied") {
                return Err(FetchError::Blocked("access denied page".into()));
            }
            if html.contains("No products found") {
                return Ok(Vec::new());
            }
            return Err(FetchError::Unrecognized);
        }

        let mut out = Vec::with_capacity(items.len().min(max_results));
        for item in items.into_iter().take(max_results) {
            let mut raw = RawCandidate {
                title: first_text(&item, TITLE_SELECTORS),
                price_text: first_text(&item, PRICE_SELECTORS),
                rating_text: first_text(&item, RATING_SELECTORS),
                review_count_text: first_text(&item, REVIEWS_SELECTORS),
                link: own_attr(&item, "href"),
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
impl Fetcher for MeeshoFetcher {
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
                        if html.contains("Access Denied") {
                            Err(FetchError::Blocked("access denied page".into()))
                        } else {
                            Err(FetchError::Timeout(RESULTS_WAIT))
                        }
                    }
                }
            }
        }
    }

    fn source(&self) -> SourceId {
        SourceId::Meesho
    }
}
