use crate::retailer::RetailerConfig;
use serde::{Deserialize, Serialize};

/// Main configuration structure for Shelf-Tracker
///
/// Every section has defaults, so an empty file (or no file) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    pub api: ApiConfig,

    /// Retailer rows; a row whose id matches a built-in replaces it
    #[serde(rename = "retailer")]
    pub retailers: Vec<RetailerConfig>,
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of requests in flight across all domains
    pub global_concurrency: u32,

    /// Maximum number of requests in flight per domain
    pub per_domain_concurrency: u32,

    /// Minimum time between two requests to the same domain (milliseconds)
    pub download_delay_ms: u64,

    /// Product cap used when a crawl does not name one
    pub default_max_products: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            global_concurrency: 8,
            per_domain_concurrency: 4,
            download_delay_ms: 500,
            default_max_products: 100,
        }
    }
}

/// HTTP and rendering fetch configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    pub user_agent: String,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Retries after a transient failure
    pub retry_times: u32,

    /// Base delay between retries, multiplied by the attempt number (milliseconds)
    pub retry_backoff_ms: u64,

    pub obey_robots: bool,

    /// Headless-browser endpoint serving rendered HTML; rendered fetches fail without it
    pub render_endpoint: Option<String>,

    /// How long the renderer waits for the awaited element (milliseconds)
    pub render_timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "ShelfTracker/{} (+price monitoring)",
                env!("CARGO_PKG_VERSION")
            ),
            timeout_secs: 45,
            retry_times: 3,
            retry_backoff_ms: 500,
            obey_robots: true,
            render_endpoint: None,
            render_timeout_ms: 20_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./shelf-tracker.db".to_string(),
        }
    }
}

/// Query API configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct ApiConfig {
    /// Socket address the API listens on
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}
