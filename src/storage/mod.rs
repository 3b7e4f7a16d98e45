//! Storage module for persisting crawl results
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The validation gate in front of the products table
//! - Session bookkeeping and statistics
//! - The product read API used by the query server

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteSink, SqliteStorage};
pub use traits::{ProductSink, SinkOutcome, Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Result of offering a record to the validation gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Stored under this row id
    Stored(i64),

    /// Dropped; lists the missing fields
    Rejected(Vec<&'static str>),
}

/// A persisted product as served by the read API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredProduct {
    pub id: i64,
    pub title: String,
    pub price: Decimal,
    pub image_url: String,
    pub store: String,
    pub captured_at: DateTime<Utc>,
}

/// Represents a crawl session row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: i64,
    pub store: String,
    pub seed: String,
    pub config_hash: String,
    pub max_products: Option<i64>,
    pub status: SessionStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub emitted_count: i64,
    pub rejected_count: i64,
}

/// Status of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
