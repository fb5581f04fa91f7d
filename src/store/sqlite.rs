//! SQLite-backed cache store.
//!
//! One append-only table of JSON documents. `fetched_at` is duplicated out
//! of the document as unix milliseconds so `find_latest` stays an indexed
//! `ORDER BY` instead of a scan-and-parse.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use super::{CacheError, CacheStore};
use crate::product::SearchResult;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and ensure the schema exists. `url` comes from `DATABASE_URL`
    /// (e.g. `sqlite://cache.db` or `sqlite::memory:`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let opts = SqliteConnectOptions::from_str(url)
            .map_err(unavailable)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(unavailable)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS search_results (
                 id TEXT PRIMARY KEY,
                 query TEXT NOT NULL,
                 fetched_at INTEGER NOT NULL,
                 doc TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await
        .map_err(unavailable)?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_search_results_query
             ON search_results (query, fetched_at)",
        )
        .execute(&pool)
        .await
        .map_err(unavailable)?;

        Ok(Self { pool })
    }
}

fn unavailable(e: sqlx::Error) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn find_latest(&self, query: &str) -> Result<Option<SearchResult>, CacheError> {
        let row = sqlx::query(
            "SELECT doc FROM search_results
             WHERE query = ?1
             ORDER BY fetched_at DESC, rowid DESC
             LIMIT 1",
        )
        .bind(query)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(row) => {
                let doc: String = row.get("doc");
                Ok(Some(serde_json::from_str(&doc)?))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, result: &SearchResult) -> Result<String, CacheError> {
        let id = Uuid::new_v4().to_string();
        let doc = serde_json::to_string(result)?;
        sqlx::query(
            "INSERT INTO search_results (id, query, fetched_at, doc)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&id)
        .bind(&result.query)
        .bind(result.fetched_at.timestamp_millis())
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(id)
    }

    async fn history(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CacheError> {
        let rows = sqlx::query(
            "SELECT doc FROM search_results
             WHERE query = ?1
             ORDER BY fetched_at DESC, rowid DESC
             LIMIT ?2",
        )
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(|row| {
                let doc: String = row.get("doc");
                Ok(serde_json::from_str(&doc)?)
            })
            .collect()
    }
}
