//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FetchState`: per-URL escalation state machine (plain fetch, at most one rendered fetch)
//! - `CrawlSession`: per-run counters, visited set and stop conditions
//! - `Seed`: what a session crawls

mod fetch_state;
mod session;

pub use fetch_state::FetchState;
pub use session::{split_query, Claim, CrawlSession, Seed, SessionSnapshot};
