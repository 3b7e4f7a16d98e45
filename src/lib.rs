//! Shelf-Tracker: a multi-retailer price monitor
//!
//! This crate walks retailer listing pages, visits product pages, extracts a normalized
//! product record (title, SKU, price, currency, stock, image) through ordered per-field
//! strategies, and persists the results for the query API.

pub mod api;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod normalize;
pub mod output;
pub mod page;
pub mod record;
pub mod retailer;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;
pub mod walker;

use thiserror::Error;

/// Main error type for Shelf-Tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unknown retailer: {0}")]
    UnknownRetailer(String),

    #[error("No seed for retailer {store}: supply a query, product URLs or configure category URLs")]
    MissingSeed { store: String },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::FetchState,
        to: state::FetchState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in retailer '{retailer}': {selector}")]
    InvalidSelector { retailer: String, selector: String },

    #[error("Invalid pattern in retailer '{retailer}': {message}")]
    InvalidPattern { retailer: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Shelf-Tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{ProductRecord, StoreTag};
pub use retailer::RetailerConfig;
pub use state::{CrawlSession, FetchState};
pub use crate::url::{canonical_product_url, extract_domain};
