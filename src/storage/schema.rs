//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Shelf-Tracker database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl session
CREATE TABLE IF NOT EXISTS crawl_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store TEXT NOT NULL,
    seed TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    max_products INTEGER,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    emitted_count INTEGER NOT NULL DEFAULT 0,
    rejected_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sessions_store ON crawl_sessions(store);

-- Product observations that passed the validation gate
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES crawl_sessions(id),
    store TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    sku TEXT,
    price TEXT NOT NULL,
    price_raw TEXT,
    currency TEXT NOT NULL,
    in_stock INTEGER,
    image_url TEXT NOT NULL,
    captured_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_captured ON products(captured_at);
CREATE INDEX IF NOT EXISTS idx_products_store ON products(store);
CREATE INDEX IF NOT EXISTS idx_products_url ON products(url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
