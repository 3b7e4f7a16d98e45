//! Crawler module for fetching and processing retailer pages
//!
//! This module contains the core crawling logic, including:
//! - The fetch collaborator trait and its HTTP implementation
//! - Request throttling
//! - The plain-then-rendered escalation controller
//! - Overall session coordination

mod coordinator;
pub mod escalation;
mod fetcher;
#[cfg(any(test, feature = "test-util"))]
mod scripted;
mod throttle;

pub use coordinator::{Coordinator, CrawlReport};
pub use escalation::{run_escalation, EscalationOutcome, ExtractionAttempt};
pub use fetcher::{
    build_http_client, Fetch, FetchError, FetchMode, FetchRequest, HttpFetcher, PageContent,
};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedFetcher;
pub use throttle::{Throttle, ThrottlePermit};

use crate::config::Config;
use crate::state::{CrawlSession, Seed};
use crate::storage::{SessionStatus, SqliteSink, SqliteStorage, Storage};
use crate::{Result, TrackerError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// What to crawl, as given on the command line or by the crawl trigger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlOptions {
    /// Retailer identifier
    pub store: String,
    /// Search terms, comma separated
    pub query: Option<String>,
    pub category_urls: Vec<Url>,
    pub product_urls: Vec<Url>,
    /// `None` uses the configured default; `Some(0)` is unbounded
    pub max_products: Option<usize>,
    pub max_pages: Option<usize>,
}

/// Result of a finished crawl session
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub session_id: i64,
    pub store: String,
    pub seed: String,
    pub status: SessionStatus,
    pub report: CrawlReport,
}

/// Runs a complete crawl session against the configured database
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Resolve the retailer and the seed (failing before anything is written)
/// 2. Build the HTTP fetcher
/// 3. Record a session row
/// 4. Walk listings, extract products and persist records
/// 5. Record the session's final status and counters
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Digest of the configuration file, stored with the session
/// * `options` - What to crawl
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The session ran (possibly emitting nothing)
/// * `Err(TrackerError)` - Unknown retailer, missing seed, or storage failure
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    options: CrawlOptions,
) -> Result<CrawlSummary> {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(config)?);
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    run_crawl_with(
        fetcher,
        Arc::new(Mutex::new(storage)),
        config,
        config_hash,
        options,
    )
    .await
}

/// Runs a crawl session with the given fetcher and storage
pub async fn run_crawl_with(
    fetcher: Arc<dyn Fetch>,
    storage: Arc<Mutex<SqliteStorage>>,
    config: &Config,
    config_hash: &str,
    options: CrawlOptions,
) -> Result<CrawlSummary> {
    let table = config.retailer_table()?;
    let retailer = table
        .get(&options.store)
        .ok_or_else(|| TrackerError::UnknownRetailer(options.store.clone()))?;

    let seed = Seed::resolve(
        &retailer,
        options.query.as_deref(),
        options.category_urls,
        options.product_urls,
    )?;

    let max_products = match options
        .max_products
        .unwrap_or(config.crawler.default_max_products)
    {
        0 => None,
        n => Some(n),
    };

    let description = seed.describe();
    let session_id = storage.lock().await.create_session(
        retailer.id(),
        &description,
        config_hash,
        max_products,
    )?;

    tracing::info!(
        "Session {} for {} ({}), max products: {}",
        session_id,
        retailer.id(),
        description,
        max_products.map_or("unbounded".to_string(), |n| n.to_string())
    );

    let session = Arc::new(CrawlSession::new(seed, max_products, options.max_pages));
    let sink = Arc::new(SqliteSink::new(Arc::clone(&storage), session_id));

    let report = Coordinator::new(fetcher, sink, Arc::clone(&retailer), session)
        .run()
        .await;
    let status = report.status();

    storage
        .lock()
        .await
        .finish_session(session_id, status, report.emitted, report.rejected)?;

    Ok(CrawlSummary {
        session_id,
        store: retailer.id().to_string(),
        seed: description,
        status,
        report,
    })
}
