//! Output module for reporting stored products and crawl results
//!
//! This module handles:
//! - Printing stored products for the `products` command
//! - Printing the summary of a finished crawl session
//! - Statistics over the product database

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::crawler::CrawlSummary;
use crate::storage::StoredProduct;

/// Formats one stored product as a single table line
pub fn format_product(product: &StoredProduct) -> String {
    format!(
        "{:>6}  {:<8}  {:>10}  {}  {}",
        product.id,
        product.store,
        product.price.round_dp(2).to_string(),
        product.captured_at.format("%Y-%m-%d %H:%M:%S"),
        product.title
    )
}

/// Prints stored products, newest first
pub fn print_products(products: &[StoredProduct]) {
    if products.is_empty() {
        println!("No stored products.");
        return;
    }

    println!(
        "{:>6}  {:<8}  {:>10}  {:<19}  {}",
        "id", "store", "price", "captured", "title"
    );
    for product in products {
        println!("{}", format_product(product));
    }
}

/// Prints the summary of a finished crawl session
pub fn print_crawl_summary(summary: &CrawlSummary) {
    let report = &summary.report;

    println!("=== Crawl Session {} ===\n", summary.session_id);
    println!("Store: {}", summary.store);
    println!("Seed: {}", summary.seed);
    println!("Status: {}", summary.status.to_db_string());
    println!();
    println!("Listing pages: {}", report.listing_pages);
    println!("Records emitted: {}", report.emitted);
    println!("  stored: {}", report.stored);
    println!("  rejected: {}", report.rejected);
    if report.sink_failures > 0 {
        println!("  failed to persist: {}", report.sink_failures);
    }
    println!("Rendered re-fetches: {}", report.escalations);
    println!("Abandoned product URLs: {}", report.abandoned);
    if report.discarded > 0 {
        println!("Discarded after cap: {}", report.discarded);
    }
    if report.bot_walls > 0 {
        println!("Bot walls: {}", report.bot_walls);
    }
    if report.listing_failures > 0 {
        println!("Failed listing fetches: {}", report.listing_failures);
    }
}
