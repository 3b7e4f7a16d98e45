//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends, the product sink the
//! crawler emits into, and associated error types.

use crate::record::ProductRecord;
use crate::storage::{PersistOutcome, SessionRecord, SessionStatus, StoredProduct};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
pub trait Storage {
    // ===== Sessions =====

    /// Creates a session row in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created session
    fn create_session(
        &mut self,
        store: &str,
        seed: &str,
        config_hash: &str,
        max_products: Option<usize>,
    ) -> StorageResult<i64>;

    /// Records the final status and counters of a session
    fn finish_session(
        &mut self,
        session_id: i64,
        status: SessionStatus,
        emitted: usize,
        rejected: usize,
    ) -> StorageResult<()>;

    fn get_session(&self, session_id: i64) -> StorageResult<SessionRecord>;

    /// Most recent sessions first
    fn latest_sessions(&self, limit: usize) -> StorageResult<Vec<SessionRecord>>;

    // ===== Products =====

    /// Persists a record unless it lacks a title, price or image
    ///
    /// A rejected record is logged and reported as [`PersistOutcome::Rejected`]; rejection
    /// is never an error.
    fn persist_product(
        &mut self,
        session_id: i64,
        record: &ProductRecord,
    ) -> StorageResult<PersistOutcome>;

    /// All stored products, newest capture first
    fn list_products(&self) -> StorageResult<Vec<StoredProduct>>;

    /// The `limit` newest stored products
    fn list_products_limited(&self, limit: usize) -> StorageResult<Vec<StoredProduct>>;

    // ===== Statistics =====

    fn count_products(&self) -> StorageResult<u64>;

    /// Stored product counts per store, ordered by store
    fn count_products_by_store(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Records rejected by the validation gate, summed over sessions
    fn count_rejected(&self) -> StorageResult<u64>;
}

/// What happened to a record handed to a [`ProductSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    Stored(i64),
    Rejected,
    /// The backend failed; the failure was logged
    Failed,
}

/// Destination of emitted product records
///
/// Implementations never surface errors: incomplete records and backend failures are
/// logged and reported through [`SinkOutcome`] so that a crawl keeps going.
#[async_trait]
pub trait ProductSink: Send + Sync {
    async fn accept(&self, record: ProductRecord) -> SinkOutcome;
}
