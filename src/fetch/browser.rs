//! Browser session pool.
//!
//! Each in-flight fetch owns one headless Chrome instance exclusively for
//! its whole lifetime; the pool only bounds how many run at once. Launching
//! a fresh browser per acquisition keeps cookies and local storage isolated
//! between unrelated queries. Session reuse would be an optimization the
//! guard API permits later, not a correctness requirement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use super::FetchError;

#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Concurrent session cap; each session is an expensive Chrome process.
    pub max_sessions: usize,
    pub headless: bool,
    /// Explicit Chrome binary; when unset, chromiumoxide probes the system.
    pub chrome_path: Option<String>,
    /// CDP request timeout for navigation commands.
    pub nav_timeout: Duration,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 4,
            headless: true,
            chrome_path: None,
            nav_timeout: Duration::from_secs(30),
        }
    }
}

/// Bounded pool of browser sessions. Acquisition is scoped: the returned
/// guard releases its slot and kills its Chrome process on drop, on every
/// path including failure.
pub struct BrowserPool {
    permits: Arc<Semaphore>,
    cfg: BrowserPoolConfig,
}

impl BrowserPool {
    pub fn new(cfg: BrowserPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(cfg.max_sessions.max(1))),
            cfg,
        })
    }

    /// Wait for a free slot, then launch a browser bound to it.
    pub async fn acquire(&self) -> Result<BrowserSession, FetchError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Browser("session pool closed".into()))?;
        let (browser, handler) = launch(&self.cfg).await?;
        Ok(BrowserSession {
            browser,
            handler,
            _permit: permit,
        })
    }
}

async fn launch(cfg: &BrowserPoolConfig) -> Result<(Browser, JoinHandle<()>), FetchError> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(cfg.nav_timeout)
        .window_size(1366, 900)
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-notifications")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio");
    if let Some(path) = &cfg.chrome_path {
        builder = builder.chrome_executable(path);
    }
    if !cfg.headless {
        builder = builder.with_head();
    }
    let config = builder.build().map_err(FetchError::Browser)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| FetchError::Browser(e.to_string()))?;

    // The CDP event loop must be polled for the session to make progress.
    // The task is tracked so the guard can abort it on drop.
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!(error = ?e, "browser handler event error");
            }
        }
    });

    Ok((browser, handler_task))
}

/// Terminal state of a page load: ready markup, or the last snapshot taken
/// when the wait expired so the caller can tell a captcha wall from a slow
/// render.
pub enum PageState {
    Ready(String),
    TimedOut(String),
}

/// One exclusive browser session.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _permit: OwnedSemaphorePermit,
}

impl BrowserSession {
    /// Navigate to `url`, poll (bounded by `wait`) for `ready_selector` to
    /// appear in the DOM, then snapshot the rendered HTML.
    pub async fn html_when_ready(
        &self,
        url: &str,
        ready_selector: &str,
        wait: Duration,
    ) -> Result<PageState, FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;
        let state = drive(&page, url, ready_selector, wait).await;
        if let Err(e) = page.close().await {
            debug!(error = ?e, "closing page failed");
        }
        state
    }
}

async fn drive(
    page: &Page,
    url: &str,
    ready_selector: &str,
    wait: Duration,
) -> Result<PageState, FetchError> {
    page.goto(url).await.map_err(browser_err)?;
    // Rendering continues after navigation resolves; the marker poll below
    // is the actual readiness signal.
    let _ = page.wait_for_navigation().await;

    let start = Instant::now();
    let poll = Duration::from_millis(250);
    loop {
        if page.find_element(ready_selector).await.is_ok() {
            let html = page.content().await.map_err(browser_err)?;
            return Ok(PageState::Ready(html));
        }
        if start.elapsed() >= wait {
            let html = page.content().await.unwrap_or_default();
            return Ok(PageState::TimedOut(html));
        }
        tokio::time::sleep(poll).await;
    }
}

fn browser_err(e: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::Browser(e.to_string())
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Browser::drop kills the Chrome process; the handler task would
        // otherwise outlive it polling a dead connection.
        self.handler.abort();
    }
}
