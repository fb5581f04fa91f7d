//! Externalized configuration.
//!
//! Every runtime knob is injectable via the environment (`.env` in dev); an
//! optional TOML file supplies defaults that env vars override. Connection
//! strings and other secrets never live in source.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::fetch::browser::BrowserPoolConfig;
use crate::orchestrator::OrchestratorConfig;

const ENV_CONFIG_PATH: &str = "SEARCH_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/search.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub max_results: usize,
    /// Absent → in-memory cache store.
    pub database_url: Option<String>,
    pub browser_pool: usize,
    pub headless: bool,
    pub chrome_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8000).into(),
            cache_ttl_secs: 24 * 3600,
            fetch_timeout_secs: 300,
            max_results: 20,
            database_url: None,
            browser_pool: 4,
            headless: true,
            chrome_path: None,
        }
    }
}

/// TOML shape; everything optional so a partial file works.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind_addr: Option<String>,
    cache_ttl_secs: Option<u64>,
    fetch_timeout_secs: Option<u64>,
    max_results: Option<usize>,
    database_url: Option<String>,
    browser_pool: Option<usize>,
    headless: Option<bool>,
    chrome_path: Option<String>,
}

impl AppConfig {
    /// Load order: built-in defaults ← TOML file (if present) ← env vars.
    pub fn load() -> Result<Self> {
        let mut cfg = AppConfig::default();
        apply_file(&mut cfg, load_file()?)?;
        apply_env(&mut cfg)?;
        Ok(cfg)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            cache_ttl: self.cache_ttl(),
            per_source_timeout: self.fetch_timeout(),
            max_results: self.max_results,
        }
    }

    pub fn browser(&self) -> BrowserPoolConfig {
        BrowserPoolConfig {
            max_sessions: self.browser_pool,
            headless: self.headless,
            chrome_path: self.chrome_path.clone(),
            ..BrowserPoolConfig::default()
        }
    }
}

fn load_file() -> Result<FileConfig> {
    let path = match std::env::var(ENV_CONFIG_PATH) {
        Ok(p) => {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("SEARCH_CONFIG_PATH points to non-existent path");
            }
            pb
        }
        Err(_) => {
            let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !pb.exists() {
                return Ok(FileConfig::default());
            }
            pb
        }
    };
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config from {}", path.display()))
}

fn apply_file(cfg: &mut AppConfig, file: FileConfig) -> Result<()> {
    if let Some(v) = file.bind_addr {
        cfg.bind_addr = v.parse().context("bind_addr in config file")?;
    }
    if let Some(v) = file.cache_ttl_secs {
        cfg.cache_ttl_secs = v;
    }
    if let Some(v) = file.fetch_timeout_secs {
        cfg.fetch_timeout_secs = v;
    }
    if let Some(v) = file.max_results {
        cfg.max_results = v;
    }
    if let Some(v) = file.database_url {
        cfg.database_url = Some(v);
    }
    if let Some(v) = file.browser_pool {
        cfg.browser_pool = v;
    }
    if let Some(v) = file.headless {
        cfg.headless = v;
    }
    if let Some(v) = file.chrome_path {
        cfg.chrome_path = Some(v);
    }
    Ok(())
}

fn apply_env(cfg: &mut AppConfig) -> Result<()> {
    if let Ok(v) = std::env::var("SEARCH_BIND_ADDR") {
        cfg.bind_addr = v.parse().context("SEARCH_BIND_ADDR")?;
    }
    if let Ok(v) = std::env::var("SEARCH_CACHE_TTL_SECS") {
        cfg.cache_ttl_secs = v.parse().context("SEARCH_CACHE_TTL_SECS")?;
    }
    if let Ok(v) = std::env::var("SEARCH_FETCH_TIMEOUT_SECS") {
        cfg.fetch_timeout_secs = v.parse().context("SEARCH_FETCH_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("SEARCH_MAX_RESULTS") {
        cfg.max_results = v.parse().context("SEARCH_MAX_RESULTS")?;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        if !v.is_empty() {
            cfg.database_url = Some(v);
        }
    }
    if let Ok(v) = std::env::var("SEARCH_BROWSER_POOL") {
        cfg.browser_pool = v.parse().context("SEARCH_BROWSER_POOL")?;
    }
    if let Ok(v) = std::env::var("SEARCH_HEADLESS") {
        cfg.headless = !matches!(v.as_str(), "0" | "false" | "no");
    }
    if let Ok(v) = std::env::var("SEARCH_CHROME_PATH") {
        if !v.is_empty() {
            cfg.chrome_path = Some(v);
        }
    }
    Ok(())
}
