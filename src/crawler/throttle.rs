//! Request throttling
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Per-domain concurrency limiting via one semaphore per domain
//! - A minimum delay between two requests to the same domain

use crate::config::CrawlerConfig;
use crate::crawler::FetchError;
use crate::url::extract_domain;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Per-domain throttling state
#[derive(Debug)]
struct DomainState {
    semaphore: Arc<Semaphore>,

    /// Start time of the most recent request to this domain
    last_request_time: tokio::sync::Mutex<Option<Instant>>,

    request_count: Mutex<u32>,
}

impl DomainState {
    fn new(per_domain_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(per_domain_limit)),
            last_request_time: tokio::sync::Mutex::new(None),
            request_count: Mutex::new(0),
        }
    }
}

/// Permission to issue one request; dropping it frees both concurrency slots
#[derive(Debug)]
pub struct ThrottlePermit {
    _domain: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Global and per-domain request limiter
#[derive(Debug)]
pub struct Throttle {
    global_semaphore: Arc<Semaphore>,
    per_domain_limit: usize,
    delay: Duration,
    domains: Mutex<HashMap<String, Arc<DomainState>>>,
}

impl Throttle {
    /// Creates a throttle from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Self {
        Self::with_limits(
            config.global_concurrency as usize,
            config.per_domain_concurrency as usize,
            Duration::from_millis(config.download_delay_ms),
        )
    }

    pub fn with_limits(global: usize, per_domain: usize, delay: Duration) -> Self {
        Self {
            global_semaphore: Arc::new(Semaphore::new(global.max(1))),
            per_domain_limit: per_domain.max(1),
            delay,
            domains: Mutex::new(HashMap::new()),
        }
    }

    fn domain_state(&self, domain: &str) -> Arc<DomainState> {
        let mut domains = self
            .domains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        Arc::clone(
            domains
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(DomainState::new(self.per_domain_limit))),
        )
    }

    /// Waits until a request to `url` may be issued
    ///
    /// Takes a per-domain slot, then a global slot, then waits out the domain's minimum
    /// delay since its previous request.
    pub async fn acquire(&self, url: &Url) -> Result<ThrottlePermit, FetchError> {
        let domain = extract_domain(url).unwrap_or_default();
        let state = self.domain_state(&domain);

        let closed = |_| FetchError::Transient {
            url: url.to_string(),
            attempts: 0,
            message: "throttle closed".to_string(),
        };

        let domain_permit = Arc::clone(&state.semaphore)
            .acquire_owned()
            .await
            .map_err(closed)?;
        let global_permit = Arc::clone(&self.global_semaphore)
            .acquire_owned()
            .await
            .map_err(closed)?;

        {
            let mut last = state.last_request_time.lock().await;
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < self.delay {
                    tokio::time::sleep(self.delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        *state
            .request_count
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;

        tracing::trace!("Throttle granted request to {}", domain);

        Ok(ThrottlePermit {
            _domain: domain_permit,
            _global: global_permit,
        })
    }

    /// Number of requests granted for a domain so far
    pub fn request_count(&self, domain: &str) -> u32 {
        let domains = self
            .domains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        domains
            .get(domain)
            .map(|state| *state.request_count.lock().unwrap_or_else(|p| p.into_inner()))
            .unwrap_or(0)
    }

    pub fn available_global_permits(&self) -> usize {
        self.global_semaphore.available_permits()
    }
}
