//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait and the
//! product sink the crawler emits into.

use crate::record::ProductRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProductSink, SinkOutcome, Storage, StorageError, StorageResult};
use crate::storage::{PersistOutcome, SessionRecord, SessionStatus, StoredProduct};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) a database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_products(&self, limit: Option<usize>) -> StorageResult<Vec<StoredProduct>> {
        let sql = "SELECT id, title, price, image_url, store, captured_at FROM products
                   ORDER BY captured_at DESC, id DESC LIMIT ?1";
        let limit = limit.map_or(-1, |l| l as i64);

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut products = Vec::new();
        for row in rows {
            let (id, title, price, image_url, store, captured_at) = row?;
            products.push(StoredProduct {
                id,
                title,
                price: Decimal::from_str(&price).map_err(|e| StorageError::CorruptRow {
                    table: "products",
                    message: format!("price '{}' of row {}: {}", price, id, e),
                })?,
                image_url,
                store,
                captured_at: parse_timestamp(&captured_at).ok_or_else(|| {
                    StorageError::CorruptRow {
                        table: "products",
                        message: format!("captured_at '{}' of row {}", captured_at, id),
                    }
                })?,
            });
        }

        Ok(products)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        store: row.get(1)?,
        seed: row.get(2)?,
        config_hash: row.get(3)?,
        max_products: row.get(4)?,
        status: SessionStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(SessionStatus::Running),
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        emitted_count: row.get(8)?,
        rejected_count: row.get(9)?,
    })
}

const SESSION_COLUMNS: &str = "id, store, seed, config_hash, max_products, status, started_at, \
                               finished_at, emitted_count, rejected_count";

impl Storage for SqliteStorage {
    // ===== Sessions =====

    fn create_session(
        &mut self,
        store: &str,
        seed: &str,
        config_hash: &str,
        max_products: Option<usize>,
    ) -> StorageResult<i64> {
        let now = format_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO crawl_sessions (store, seed, config_hash, max_products, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                store,
                seed,
                config_hash,
                max_products.map(|m| m as i64),
                SessionStatus::Running.to_db_string(),
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_session(
        &mut self,
        session_id: i64,
        status: SessionStatus,
        emitted: usize,
        rejected: usize,
    ) -> StorageResult<()> {
        let now = format_timestamp(&Utc::now());
        let changed = self.conn.execute(
            "UPDATE crawl_sessions
             SET status = ?1, finished_at = ?2, emitted_count = ?3, rejected_count = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                emitted as i64,
                rejected as i64,
                session_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::SessionNotFound(session_id));
        }
        Ok(())
    }

    fn get_session(&self, session_id: i64) -> StorageResult<SessionRecord> {
        let sql = format!("SELECT {} FROM crawl_sessions WHERE id = ?1", SESSION_COLUMNS);
        self.conn
            .query_row(&sql, params![session_id], session_from_row)
            .optional()?
            .ok_or(StorageError::SessionNotFound(session_id))
    }

    fn latest_sessions(&self, limit: usize) -> StorageResult<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_sessions ORDER BY id DESC LIMIT ?1",
            SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![limit as i64], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // ===== Products =====

    fn persist_product(
        &mut self,
        session_id: i64,
        record: &ProductRecord,
    ) -> StorageResult<PersistOutcome> {
        let missing = record.missing_fields();
        let (true, Some(price), Some(image_url)) = (
            missing.is_empty(),
            record.price,
            record.image_url.as_deref(),
        ) else {
            warn!(
                url = %record.url,
                store = %record.store,
                "Dropping record missing {}",
                missing.join(", ")
            );
            return Ok(PersistOutcome::Rejected(missing));
        };

        self.conn.execute(
            "INSERT INTO products
             (session_id, store, url, title, sku, price, price_raw, currency, in_stock, image_url, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session_id,
                record.store.as_str(),
                record.url.as_str(),
                record.title,
                record.sku,
                price.to_string(),
                record.price_raw,
                record.currency,
                record.in_stock,
                image_url,
                format_timestamp(&record.timestamp),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(url = %record.url, "Stored product {}", id);
        Ok(PersistOutcome::Stored(id))
    }

    fn list_products(&self) -> StorageResult<Vec<StoredProduct>> {
        self.query_products(None)
    }

    fn list_products_limited(&self, limit: usize) -> StorageResult<Vec<StoredProduct>> {
        self.query_products(Some(limit))
    }

    // ===== Statistics =====

    fn count_products(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_products_by_store(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT store, COUNT(*) FROM products GROUP BY store ORDER BY store")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn count_rejected(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(rejected_count), 0) FROM crawl_sessions",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Product sink writing into a shared [`SqliteStorage`] under one session
pub struct SqliteSink {
    storage: Arc<Mutex<SqliteStorage>>,
    session_id: i64,
}

impl SqliteSink {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, session_id: i64) -> Self {
        Self {
            storage,
            session_id,
        }
    }
}

#[async_trait]
impl ProductSink for SqliteSink {
    async fn accept(&self, record: ProductRecord) -> SinkOutcome {
        let mut storage = self.storage.lock().await;

        match storage.persist_product(self.session_id, &record) {
            Ok(PersistOutcome::Stored(id)) => SinkOutcome::Stored(id),
            Ok(PersistOutcome::Rejected(_)) => SinkOutcome::Rejected,
            Err(e) => {
                error!(url = %record.url, "Failed to persist product: {}", e);
                SinkOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StoreTag;
    use chrono::Duration;
    use url::Url;

    fn record(title: &str, price: Option<&str>, image: Option<&str>) -> ProductRecord {
        ProductRecord {
            store: StoreTag::new("heb"),
            url: Url::parse("https://www.heb.com.mx/cafe-123456/p").unwrap(),
            title: title.to_string(),
            sku: Some("123456".to_string()),
            price: price.map(|p| Decimal::from_str(p).unwrap()),
            price_raw: price.map(|p| format!("$ {}", p)),
            currency: "MXN".to_string(),
            in_stock: Some(true),
            image_url: image.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    fn storage_with_session() -> (SqliteStorage, i64) {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let id = storage.create_session("heb", "query: cafe", "abc", Some(10)).unwrap();
        (storage, id)
    }

    #[test]
    fn test_persist_complete_record() {
        let (mut storage, session) = storage_with_session();
        let outcome = storage
            .persist_product(session, &record("Café", Some("89.90"), Some("https://img/c.jpg")))
            .unwrap();

        assert!(matches!(outcome, PersistOutcome::Stored(_)));
        let products = storage.list_products().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "Café");
        assert_eq!(products[0].price, Decimal::from_str("89.90").unwrap());
        assert_eq!(products[0].store, "heb");
    }

    #[test]
    fn test_gate_rejects_incomplete_records() {
        let (mut storage, session) = storage_with_session();

        let no_image = storage
            .persist_product(session, &record("Café", Some("89.90"), None))
            .unwrap();
        assert_eq!(no_image, PersistOutcome::Rejected(vec!["image_url"]));

        let no_price = storage
            .persist_product(session, &record("Café", None, Some("https://img/c.jpg")))
            .unwrap();
        assert_eq!(no_price, PersistOutcome::Rejected(vec!["price"]));

        let no_title = storage
            .persist_product(session, &record(" ", Some("1"), Some("https://img/c.jpg")))
            .unwrap();
        assert_eq!(no_title, PersistOutcome::Rejected(vec!["title"]));

        assert_eq!(storage.count_products().unwrap(), 0);
    }

    #[test]
    fn test_list_orders_by_capture_desc() {
        let (mut storage, session) = storage_with_session();
        let base = Utc::now();

        for (i, offset) in [2i64, 0, 1].iter().enumerate() {
            let mut r = record(&format!("p{}", i), Some("10"), Some("https://img/x.jpg"));
            r.timestamp = base + Duration::seconds(*offset);
            storage.persist_product(session, &r).unwrap();
        }

        let titles: Vec<_> = storage
            .list_products()
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["p0", "p2", "p1"]);

        let limited = storage.list_products_limited(2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].title, "p0");
    }

    #[test]
    fn test_same_timestamp_ties_by_id() {
        let (mut storage, session) = storage_with_session();
        let ts = Utc::now();
        for title in ["first", "second"] {
            let mut r = record(title, Some("1"), Some("https://img/x.jpg"));
            r.timestamp = ts;
            storage.persist_product(session, &r).unwrap();
        }

        let products = storage.list_products().unwrap();
        assert_eq!(products[0].title, "second");
        assert_eq!(products[1].title, "first");
    }

    #[test]
    fn test_session_lifecycle() {
        let (mut storage, session) = storage_with_session();

        let running = storage.get_session(session).unwrap();
        assert_eq!(running.status, SessionStatus::Running);
        assert_eq!(running.max_products, Some(10));
        assert!(running.finished_at.is_none());

        storage
            .finish_session(session, SessionStatus::Completed, 7, 2)
            .unwrap();
        let done = storage.get_session(session).unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.emitted_count, 7);
        assert_eq!(done.rejected_count, 2);
        assert!(done.finished_at.is_some());

        assert_eq!(storage.count_rejected().unwrap(), 2);
    }

    #[test]
    fn test_missing_session() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(matches!(
            storage.get_session(42),
            Err(StorageError::SessionNotFound(42))
        ));
        assert!(storage
            .finish_session(42, SessionStatus::Failed, 0, 0)
            .is_err());
    }

    #[test]
    fn test_latest_sessions_and_store_counts() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let heb = storage.create_session("heb", "q", "h", None).unwrap();
        let soriana = storage.create_session("soriana", "q", "h", None).unwrap();

        storage
            .persist_product(heb, &record("a", Some("1"), Some("https://img/a.jpg")))
            .unwrap();
        let mut other = record("b", Some("2"), Some("https://img/b.jpg"));
        other.store = StoreTag::new("soriana");
        storage.persist_product(soriana, &other).unwrap();
        storage.persist_product(soriana, &other).unwrap();

        let latest = storage.latest_sessions(1).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].store, "soriana");

        assert_eq!(
            storage.count_products_by_store().unwrap(),
            vec![("heb".to_string(), 1), ("soriana".to_string(), 2)]
        );
    }

    #[test]
    fn test_on_disk_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.db");

        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            let session = storage.create_session("heb", "q", "h", None).unwrap();
            storage
                .persist_product(session, &record("a", Some("1"), Some("https://img/a.jpg")))
                .unwrap();
        }

        let reopened = SqliteStorage::new(&path).unwrap();
        assert_eq!(reopened.count_products().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sink_swallows_rejections() {
        let (storage, session) = storage_with_session();
        let storage = Arc::new(Mutex::new(storage));
        let sink = SqliteSink::new(Arc::clone(&storage), session);

        let stored = sink
            .accept(record("Café", Some("1"), Some("https://img/c.jpg")))
            .await;
        assert!(matches!(stored, SinkOutcome::Stored(_)));

        let rejected = sink.accept(record("Café", Some("1"), None)).await;
        assert_eq!(rejected, SinkOutcome::Rejected);

        assert_eq!(storage.lock().await.count_products().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sink_reports_backend_failure() {
        let storage = Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()));
        // No session row: the foreign key makes the insert fail.
        let sink = SqliteSink::new(storage, 999);

        let outcome = sink
            .accept(record("Café", Some("1"), Some("https://img/c.jpg")))
            .await;
        assert_eq!(outcome, SinkOutcome::Failed);
    }
}
