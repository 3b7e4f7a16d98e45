//! Robots.txt caching implementation
//!
//! Each host's robots.txt is fetched once and kept for 24 hours.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Cached robots.txt data for a host
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Per-origin robots.txt cache
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether `url` may be fetched, fetching the origin's robots.txt on first use
    ///
    /// A robots.txt that cannot be fetched (network error, non-2xx status) allows
    /// everything.
    pub async fn is_allowed(&self, client: &Client, url: &Url, user_agent: &str) -> bool {
        let origin = url.origin().ascii_serialization();

        {
            let entries = self.entries.lock().await;
            if let Some(cached) = entries.get(&origin) {
                if !cached.is_stale() {
                    return cached.content.is_allowed(url.as_str(), user_agent);
                }
            }
        }

        let robots = fetch_robots(client, &origin).await;
        let allowed = robots.is_allowed(url.as_str(), user_agent);

        self.entries
            .lock()
            .await
            .insert(origin, CachedRobots::new(robots));

        allowed
    }

    /// Stores robots.txt content for an origin without fetching it
    pub async fn insert(&self, origin: &str, robots: ParsedRobots) {
        self.entries
            .lock()
            .await
            .insert(origin.to_string(), CachedRobots::new(robots));
    }
}

async fn fetch_robots(client: &Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin);

    match client.get(&robots_url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => {
                debug!("Fetched {}", robots_url);
                ParsedRobots::from_content(&body)
            }
            Err(e) => {
                warn!("Failed to read {}: {}", robots_url, e);
                ParsedRobots::allow_all()
            }
        },
        Ok(response) => {
            debug!("{} returned {}, allowing all", robots_url, response.status());
            ParsedRobots::allow_all()
        }
        Err(e) => {
            warn!("Failed to fetch {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
