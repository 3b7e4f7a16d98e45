//! Request and response bodies of the query API

use serde::{Deserialize, Serialize};

/// Body of `POST /api/crawls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// Retailer identifier
    pub target: String,
    pub query: String,
    /// Omitted uses the configured default
    #[serde(default)]
    pub max_products: Option<usize>,
}

/// Acknowledgment of a launched crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlAccepted {
    pub status: String,
    pub target: String,
    pub query: String,
    pub max_products: usize,
}

/// Query string of `GET /api/products`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned with every 4xx/5xx
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
