//! Statistics over the product database
//!
//! This module provides functionality for extracting and displaying
//! statistics about stored products and past crawl sessions.

use crate::storage::{SessionRecord, Storage};
use crate::Result;

/// Number of recent sessions shown by `stats`
pub const RECENT_SESSIONS: usize = 10;

/// Product database statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    /// Total number of stored products
    pub total_products: u64,

    /// Stored products per store, ordered by store
    pub products_by_store: Vec<(String, u64)>,

    /// Records dropped by the validation gate (missing title, price or image)
    pub rejected_records: u64,

    /// Most recent sessions first
    pub recent_sessions: Vec<SessionRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(TrackerError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_products: storage.count_products()?,
        products_by_store: storage.count_products_by_store()?,
        rejected_records: storage.count_rejected()?,
        recent_sessions: storage.latest_sessions(RECENT_SESSIONS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Product Statistics ===\n");

    println!("Overview:");
    println!("  Stored products: {}", stats.total_products);
    println!("  Rejected records: {}", stats.rejected_records);
    println!();

    if !stats.products_by_store.is_empty() {
        println!("Products by Store:");
        for (store, count) in &stats.products_by_store {
            let percentage = if stats.total_products > 0 {
                (*count as f64 / stats.total_products as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", store, count, percentage);
        }
        println!();
    }

    if !stats.recent_sessions.is_empty() {
        println!("Recent Sessions:");
        for session in &stats.recent_sessions {
            println!(
                "  #{} {} [{}] {} emitted, {} rejected, started {} ({})",
                session.id,
                session.store,
                session.status.to_db_string(),
                session.emitted_count,
                session.rejected_count,
                session.started_at,
                session.seed
            );
        }
        println!();
    }

    let emitted: i64 = stats.recent_sessions.iter().map(|s| s.emitted_count).sum();
    let rejected: i64 = stats.recent_sessions.iter().map(|s| s.rejected_count).sum();
    if emitted > 0 {
        println!(
            "Acceptance Rate (recent sessions): {:.1}% ({} / {} records stored)",
            (emitted - rejected) as f64 / emitted as f64 * 100.0,
            emitted - rejected,
            emitted
        );
    }
}
