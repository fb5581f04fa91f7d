//! # Cache Store
//! Append-only document store for [`SearchResult`]s, keyed by the exact
//! query string. Inserts never update in place: the historical trail stays
//! intact and the write path has no read-modify-write races under
//! concurrent queries for the same term. "Current" is simply the most
//! recent document by `fetched_at`.

pub mod sqlite;

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::product::SearchResult;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Store unreachable. The orchestrator treats the cache as an
    /// optimization and degrades to fetch-without-persist.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Point lookup: the most recent document for this exact query string.
    /// Case-sensitive, no fuzzy matching.
    async fn find_latest(&self, query: &str) -> Result<Option<SearchResult>, CacheError>;

    /// Append-only insert; returns the new document id.
    async fn insert(&self, result: &SearchResult) -> Result<String, CacheError>;

    /// Historical documents for a query, newest first.
    async fn history(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CacheError>;
}

/// In-memory append-only store: the default backend when no `DATABASE_URL`
/// is configured, and the backend tests run against. Capped so a
/// long-running process cannot grow without bound.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Vec<(String, SearchResult)>>,
    cap: usize,
}

impl MemoryStore {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            cap: cap.min(10_000),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_capacity(10_000)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn find_latest(&self, query: &str) -> Result<Option<SearchResult>, CacheError> {
        let v = self.inner.lock().expect("memory store mutex poisoned");
        Ok(v.iter()
            .filter(|(_, r)| r.query == query)
            .max_by_key(|(_, r)| r.fetched_at)
            .map(|(_, r)| r.clone()))
    }

    async fn insert(&self, result: &SearchResult) -> Result<String, CacheError> {
        let id = Uuid::new_v4().to_string();
        let mut v = self.inner.lock().expect("memory store mutex poisoned");
        v.push((id.clone(), result.clone()));
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
        Ok(id)
    }

    async fn history(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CacheError> {
        let v = self.inner.lock().expect("memory store mutex poisoned");
        let mut rows: Vec<SearchResult> = v
            .iter()
            .filter(|(_, r)| r.query == query)
            .map(|(_, r)| r.clone())
            .collect();
        rows.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;

    fn doc(query: &str, age_secs: i64) -> SearchResult {
        let mut result = SearchResult::new(query, BTreeMap::new());
        result.fetched_at = Utc::now() - Duration::seconds(age_secs);
        result
    }

    #[tokio::test]
    async fn append_only_keeps_history_and_latest_wins() {
        let store = MemoryStore::default();
        store.insert(&doc("shoes", 3600)).await.unwrap();
        store.insert(&doc("shoes", 60)).await.unwrap();

        let history = store.history("shoes", 10).await.unwrap();
        assert_eq!(history.len(), 2);

        let latest = store.find_latest("shoes").await.unwrap().unwrap();
        assert_eq!(latest.fetched_at, history[0].fetched_at);
        assert!(latest.age_secs(Utc::now()) < 120);
    }

    #[tokio::test]
    async fn lookup_is_exact_and_case_sensitive() {
        let store = MemoryStore::default();
        store.insert(&doc("Shoes", 10)).await.unwrap();
        assert!(store.find_latest("shoes").await.unwrap().is_none());
        assert!(store.find_latest("Shoes").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cap_drops_oldest_entries() {
        let store = MemoryStore::with_capacity(2);
        store.insert(&doc("a", 30)).await.unwrap();
        store.insert(&doc("b", 20)).await.unwrap();
        store.insert(&doc("c", 10)).await.unwrap();
        assert!(store.find_latest("a").await.unwrap().is_none());
        assert!(store.find_latest("c").await.unwrap().is_some());
    }
}
