//! Myntra search results fetcher.
//!
//! Myntra splits brand and product name into separate card elements, which
//! maps directly onto the canonical record's `brand` field.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::fetch::browser::{BrowserPool, PageState};
use crate::fetch::extract::{first_attr, first_text, select_items};
use crate::fetch::{FetchError, Fetcher, RawCandidate, RawImage};
use crate::product::SourceId;

const READY_SELECTOR: &str = "ul.results-base";
const ITEM_SELECTORS: &[&str] = &["li.product-base"];
const BRAND_SELECTORS: &[&str] = &["h3.product-brand"];
const TITLE_SELECTORS: &[&str] = &["h4.product-product"];
const PRICE_SELECTORS: &[&str] = &["span.product-discountedPrice", "div.product-price span"];
const LIST_PRICE_SELECTORS: &[&str] = &["span.product-strikethrough"];
const RATING_SELECTORS: &[&str] = &["div.product-ratingsContainer span"];
const REVIEWS_SELECTORS: &[&str] = &["div.product-ratingsCount"];
const LINK_SELECTORS: &[&str] = &["a"];
const IMAGE_SELECTORS: &[&str] = &["img.product-imageSliderImage", "picture img"];

const RESULTS_WAIT: Duration = Duration::from_secs(20);

pub struct MyntraFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Browser(Arc<BrowserPool>),
}

impl MyntraFetcher {
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

    // Myntra routes search as a path segment, not a query parameter.
    fn search_url(query: &str) -> String {
        format!("https://www.myntra.com/{}", urlencoding::encode(query))
    }

    fn extract(html: &str, max_results: usize) -> Result<Vec<RawCandidate>, FetchError> {
        let doc = scraper::Html::parse_document(html);
        let items = select_items(&doc, ITEM_SELECTORS);
        if items.is_empty() {
            if html.contains("Access Denied") {
                return Err(FetchError::Blocked("access denied page".into()));
            }
            if html.contains("couldn't find any matches") {
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
impl Fetcher for MyntraFetcher {
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
        SourceId::Myntra
    }
}
