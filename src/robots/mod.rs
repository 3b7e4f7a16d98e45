//! Robots.txt handling module
//!
//! Fetches, parses and caches robots.txt per origin for the HTTP fetcher.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;
