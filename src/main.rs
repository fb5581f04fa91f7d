//! Price Scout binary entrypoint.
//! Boots the Axum HTTP server, wiring the cache store, browser session
//! pool, marketplace fetchers, and the search orchestrator.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use price_scout::api::{self, AppState};
use price_scout::config::AppConfig;
use price_scout::fetch::browser::BrowserPool;
use price_scout::fetch::providers::default_fetchers;
use price_scout::metrics::Metrics;
use price_scout::orchestrator::Orchestrator;
use price_scout::store::{sqlite::SqliteStore, CacheStore, MemoryStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("price_scout=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    let metrics = Metrics::init(cfg.cache_ttl_secs);

    let store: Arc<dyn CacheStore> = match &cfg.database_url {
        Some(url) => {
            let store = SqliteStore::connect(url)
                .await
                .context("connecting cache store")?;
            // The URL may carry credentials; never log it.
            tracing::info!("cache store: sqlite");
            Arc::new(store)
        }
        None => {
            tracing::info!("cache store: in-memory (set DATABASE_URL for durability)");
            Arc::new(MemoryStore::default())
        }
    };

    let pool = BrowserPool::new(cfg.browser());
    let fetchers = default_fetchers(&pool);
    tracing::info!(sources = fetchers.len(), "fetchers registered");

    let orchestrator = Arc::new(Orchestrator::new(store, fetchers, cfg.orchestrator()));
    let router = api::router(AppState { orchestrator }).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, router).await.context("serving http")?;
    Ok(())
}
