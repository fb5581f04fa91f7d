// src/fetch/providers/mod.rs
pub mod amazon;
pub mod flipkart;
pub mod meesho;
pub mod myntra;

pub use amazon::AmazonFetcher;
pub use flipkart::FlipkartFetcher;
pub use meesho::MeeshoFetcher;
pub use myntra::MyntraFetcher;

use std::sync::Arc;

use super::browser::BrowserPool;
use super::Fetcher;

/// All built-in marketplace fetchers over a shared session pool.
pub fn default_fetchers(pool: &Arc<BrowserPool>) -> Vec<Arc<dyn Fetcher>> {
    vec![
        Arc::new(AmazonFetcher::with_pool(Arc::clone(pool))),
        Arc::new(FlipkartFetcher::with_pool(Arc::clone(pool))),
        Arc::new(MeeshoFetcher::with_pool(Arc::clone(pool))),
        Arc::new(MyntraFetcher::with_pool(Arc::clone(pool))),
    ]
}
