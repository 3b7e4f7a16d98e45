//! Configuration module for Shelf-Tracker
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shelf_tracker::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("shelf-tracker.toml")).unwrap();
//! println!("Database: {}", config.output.database_path);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{ApiConfig, Config, CrawlerConfig, FetchConfig, OutputConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

use crate::retailer::RetailerTable;
use crate::ConfigResult;

impl Config {
    /// Builds the retailer table: built-in rows with this configuration's overrides applied
    pub fn retailer_table(&self) -> ConfigResult<RetailerTable> {
        RetailerTable::build(&self.retailers)
    }
}
