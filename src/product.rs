//! # Canonical Product Model
//! The single schema every marketplace result is normalized into. Each
//! scraper hands back string-typed raw candidates; after normalization the
//! whole system speaks [`ProductRecord`] and [`SearchResult`] only.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin marketplace of a record. `Ord` so `by_source` maps iterate in a
/// stable order regardless of fetch completion order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Amazon,
    Flipkart,
    Meesho,
    Myntra,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Amazon => "amazon",
            SourceId::Flipkart => "flipkart",
            SourceId::Meesho => "meesho",
            SourceId::Myntra => "myntra",
        }
    }

    /// Base URL relative links are resolved against.
    pub fn base_url(&self) -> &'static str {
        match self {
            SourceId::Amazon => "https://www.amazon.in",
            SourceId::Flipkart => "https://www.flipkart.com",
            SourceId::Meesho => "https://www.meesho.com",
            SourceId::Myntra => "https://www.myntra.com",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monetary amount with its currency code. Zero is a valid amount; a
/// missing price is `Option::None`, never `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn inr(amount: f64) -> Self {
        Self::new(amount, "INR")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// One normalized product listing.
///
/// `name` is `Some` only when non-empty; a candidate missing both `name`
/// and `price` carries no signal and never becomes a record at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub source: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    /// MRP; present only when it parsed, matches the price currency, and is
    /// strictly greater than `price`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    /// Star rating in [0, 5]. Kept separate from `review_count`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ProductImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ProductRecord {
    /// Empty record for `source`; the normalizer fills fields it could parse.
    pub fn empty(source: SourceId) -> Self {
        Self {
            source,
            name: None,
            price: None,
            list_price: None,
            discount_percent: None,
            discount_amount: None,
            rating: None,
            review_count: None,
            link: None,
            images: Vec::new(),
            brand: None,
            category: None,
        }
    }
}

/// The persisted cache unit: one query execution across all sources.
///
/// Append-only: a fresh query always produces a new document. Staleness is
/// computed at read time from `fetched_at`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub fetched_at: DateTime<Utc>,
    pub by_source: BTreeMap<SourceId, Vec<ProductRecord>>,
    pub total_count: usize,
}

impl SearchResult {
    /// Stamp a new result at the current time; `total_count` is derived.
    pub fn new(query: impl Into<String>, by_source: BTreeMap<SourceId, Vec<ProductRecord>>) -> Self {
        let total_count = by_source.values().map(Vec::len).sum();
        Self {
            query: query.into(),
            fetched_at: Utc::now(),
            by_source,
            total_count,
        }
    }

    /// Age of this document relative to `now` in whole seconds (>= 0).
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        now.signed_duration_since(self.fetched_at)
            .num_seconds()
            .max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_keys_serialize_lowercase() {
        let mut by_source = BTreeMap::new();
        by_source.insert(SourceId::Amazon, vec![ProductRecord::empty(SourceId::Amazon)]);
        let result = SearchResult::new("shoes", by_source);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["by_source"]["amazon"].is_array());
        assert_eq!(json["total_count"], 1);
    }

    #[test]
    fn total_count_sums_all_sources() {
        let mut by_source = BTreeMap::new();
        by_source.insert(
            SourceId::Amazon,
            vec![
                ProductRecord::empty(SourceId::Amazon),
                ProductRecord::empty(SourceId::Amazon),
            ],
        );
        by_source.insert(SourceId::Myntra, vec![ProductRecord::empty(SourceId::Myntra)]);
        assert_eq!(SearchResult::new("q", by_source).total_count, 3);
    }

    #[test]
    fn age_is_clamped_non_negative() {
        let result = SearchResult::new("q", BTreeMap::new());
        let before = result.fetched_at - chrono::Duration::seconds(5);
        assert_eq!(result.age_secs(before), 0);
    }
}
