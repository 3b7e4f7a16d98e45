//! Crawl session state
//!
//! A [`CrawlSession`] owns the counters of one crawl run: candidates issued, records
//! emitted, listing pages fetched and the visited URL set. Every check-and-update happens
//! under one lock so concurrent product tasks can never push a counter past its cap.

use crate::retailer::Retailer;
use crate::{Result, TrackerError};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// What a crawl session starts from
#[derive(Debug, Clone, PartialEq)]
pub enum Seed {
    /// One listing branch per query term
    Query(Vec<String>),

    /// Listing pages given directly
    CategoryUrls(Vec<Url>),

    /// Product pages given directly; the walker is bypassed
    ExplicitUrls(Vec<Url>),
}

impl Seed {
    /// Chooses the seed of a session
    ///
    /// Explicit product URLs take precedence, then the query (split on commas into terms),
    /// then category URLs given on the command line, then the retailer's default
    /// categories.
    ///
    /// # Returns
    ///
    /// * `Ok(Seed)` - A non-empty seed
    /// * `Err(TrackerError::MissingSeed)` - Nothing to crawl
    pub fn resolve(
        retailer: &Retailer,
        query: Option<&str>,
        category_urls: Vec<Url>,
        product_urls: Vec<Url>,
    ) -> Result<Self> {
        if !product_urls.is_empty() {
            return Ok(Seed::ExplicitUrls(product_urls));
        }

        if let Some(query) = query {
            let terms = split_query(query);
            if !terms.is_empty() {
                return Ok(Seed::Query(terms));
            }
        }

        if !category_urls.is_empty() {
            return Ok(Seed::CategoryUrls(category_urls));
        }

        let defaults = retailer.category_urls();
        if !defaults.is_empty() {
            return Ok(Seed::CategoryUrls(defaults));
        }

        Err(TrackerError::MissingSeed {
            store: retailer.id().to_string(),
        })
    }

    /// Short human-readable description, stored on the session row
    pub fn describe(&self) -> String {
        match self {
            Seed::Query(terms) => format!("query: {}", terms.join(", ")),
            Seed::CategoryUrls(urls) => format!("categories: {} url(s)", urls.len()),
            Seed::ExplicitUrls(urls) => format!("products: {} url(s)", urls.len()),
        }
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Splits a query on commas into trimmed, non-empty terms
pub fn split_query(query: &str) -> Vec<String> {
    query
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Outcome of offering a candidate product URL to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// First sighting; the caller must fetch it
    Claimed,

    /// Already visited in this session
    Duplicate,

    /// The product cap is reached; nothing more may be issued
    Capped,
}

/// Point-in-time copy of the session counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub emitted_count: usize,
    pub issued_count: usize,
    pub visited_count: usize,
    pub current_page: usize,
}

#[derive(Debug, Default)]
struct SessionState {
    emitted_count: usize,
    issued_count: usize,
    visited: HashSet<Url>,
    current_page: usize,
}

/// Counters and stop conditions of one crawl run
#[derive(Debug)]
pub struct CrawlSession {
    seed: Seed,
    max_products: Option<usize>,
    max_pages: Option<usize>,
    state: Mutex<SessionState>,
}

impl CrawlSession {
    /// Creates a session
    ///
    /// # Arguments
    ///
    /// * `seed` - What to crawl
    /// * `max_products` - Cap on candidates issued and records emitted (`None` = unbounded)
    /// * `max_pages` - Cap on listing pages fetched (`None` = unbounded)
    pub fn new(seed: Seed, max_products: Option<usize>, max_pages: Option<usize>) -> Self {
        Self {
            seed,
            max_products,
            max_pages,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    pub fn max_products(&self) -> Option<usize> {
        self.max_products
    }

    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn under_cap(&self, count: usize) -> bool {
        self.max_products.map_or(true, |max| count < max)
    }

    /// Offers a candidate URL: checks the cap and the visited set and records the URL, as
    /// one atomic step
    pub fn claim_candidate(&self, url: &Url) -> Claim {
        let mut state = self.lock();

        if !self.under_cap(state.issued_count) || !self.under_cap(state.emitted_count) {
            return Claim::Capped;
        }

        if !state.visited.insert(url.clone()) {
            return Claim::Duplicate;
        }

        state.issued_count += 1;
        Claim::Claimed
    }

    /// Reserves one emission slot
    ///
    /// # Returns
    ///
    /// * `true` - The count was incremented; the caller hands its record to storage
    /// * `false` - The cap is reached; the caller discards its record
    pub fn try_emit(&self) -> bool {
        let mut state = self.lock();

        if self.under_cap(state.emitted_count) {
            state.emitted_count += 1;
            true
        } else {
            false
        }
    }

    /// Returns true if the product cap has been reached by issued candidates or emissions
    pub fn is_capped(&self) -> bool {
        let state = self.lock();
        !self.under_cap(state.issued_count) || !self.under_cap(state.emitted_count)
    }

    /// Reserves the next listing page
    ///
    /// Fails when the product cap or the page cap is reached; otherwise increments
    /// `current_page` and returns its new value.
    pub fn begin_listing_page(&self) -> Option<usize> {
        let mut state = self.lock();

        if !self.under_cap(state.issued_count) || !self.under_cap(state.emitted_count) {
            return None;
        }

        if let Some(max_pages) = self.max_pages {
            if state.current_page >= max_pages {
                return None;
            }
        }

        state.current_page += 1;
        Some(state.current_page)
    }

    pub fn emitted_count(&self) -> usize {
        self.lock().emitted_count
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            emitted_count: state.emitted_count,
            issued_count: state.issued_count,
            visited_count: state.visited.len(),
            current_page: state.current_page,
        }
    }
}
