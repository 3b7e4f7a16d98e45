//! HTTP fetcher implementation
//!
//! This module handles all network requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Robots.txt checks before each request
//! - Throttling through the shared [`Throttle`]
//! - Retry logic for transient failures
//! - Rendered fetches through an external headless-browser endpoint

use crate::config::Config;
use crate::crawler::Throttle;
use crate::robots::RobotsCache;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// How a page should be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Raw HTTP GET, no script execution
    Plain,
    /// Executed by a browser, optionally waiting for a DOM element
    Rendered,
}

/// A single request to the fetch collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub mode: FetchMode,
    /// CSS selector a rendered fetch waits for before returning content
    pub wait_for: Option<String>,
}

impl FetchRequest {
    pub fn plain(url: Url) -> Self {
        Self {
            url,
            mode: FetchMode::Plain,
            wait_for: None,
        }
    }

    pub fn rendered(url: Url, wait_for: Option<String>) -> Self {
        Self {
            url,
            mode: FetchMode::Rendered,
            wait_for,
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.mode == FetchMode::Rendered
    }
}

/// Content returned by a successful fetch
#[derive(Debug, Clone)]
pub struct PageContent {
    pub requested_url: Url,
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub body: String,
    pub rendered: bool,
}

/// Errors produced by the fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transient failure fetching {url} after {attempts} attempt(s): {message}")]
    Transient {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Disallowed by robots.txt: {0}")]
    RobotsDenied(String),

    #[error("Rendered fetch unavailable for {0}: no render endpoint configured")]
    RenderingUnavailable(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// The fetch collaborator
///
/// Fetching is the only suspension point of a crawl; everything downstream of it is
/// synchronous.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<PageContent, FetchError>;
}

/// Outcome of one attempt, before retry classification
enum Attempt {
    Done(PageContent),
    Retry(String),
    Fail(FetchError),
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed up to 10 hops.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.fetch.user_agent.clone())
        .timeout(Duration::from_secs(config.fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch collaborator backed by `reqwest`
pub struct HttpFetcher {
    client: Client,
    throttle: Throttle,
    robots: RobotsCache,
    user_agent: String,
    obey_robots: bool,
    retry_times: u32,
    retry_backoff: Duration,
    render_endpoint: Option<Url>,
    render_timeout_ms: u64,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let render_endpoint = config
            .fetch
            .render_endpoint
            .as_deref()
            .map(|endpoint| {
                Url::parse(endpoint).map_err(|e| FetchError::InvalidUrl(format!("{endpoint}: {e}")))
            })
            .transpose()?;

        Ok(Self {
            client: build_http_client(config)?,
            throttle: Throttle::new(&config.crawler),
            robots: RobotsCache::new(),
            user_agent: config.fetch.user_agent.clone(),
            obey_robots: config.fetch.obey_robots,
            retry_times: config.fetch.retry_times,
            retry_backoff: Duration::from_millis(config.fetch.retry_backoff_ms),
            render_endpoint,
            render_timeout_ms: config.fetch.render_timeout_ms,
        })
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    async fn attempt(&self, request: &FetchRequest) -> Result<Attempt, FetchError> {
        let _permit = self.throttle.acquire(&request.url).await?;

        let sent = match request.mode {
            FetchMode::Plain => self.client.get(request.url.clone()).send().await,
            FetchMode::Rendered => {
                let endpoint = self
                    .render_endpoint
                    .clone()
                    .ok_or_else(|| FetchError::RenderingUnavailable(request.url.to_string()))?;

                let mut payload = json!({ "url": request.url.as_str() });
                if let Some(selector) = &request.wait_for {
                    payload["waitForSelector"] = json!({
                        "selector": selector,
                        "timeout": self.render_timeout_ms,
                    });
                }

                self.client
                    .post(endpoint)
                    .timeout(Duration::from_millis(self.render_timeout_ms) + Duration::from_secs(10))
                    .json(&payload)
                    .send()
                    .await
            }
        };

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(Attempt::Retry("request timeout".to_string())),
            Err(e) if e.is_connect() => return Ok(Attempt::Retry(format!("connection failed: {e}"))),
            Err(e) => return Ok(Attempt::Fail(FetchError::Http(e))),
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::Retry(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Ok(Attempt::Fail(FetchError::Status {
                url: request.url.to_string(),
                status: status.as_u16(),
            }));
        }

        // The render service answers from its own URL; the page URL is the requested one
        let final_url = match request.mode {
            FetchMode::Plain => response.url().clone(),
            FetchMode::Rendered => request.url.clone(),
        };

        match response.text().await {
            Ok(body) => Ok(Attempt::Done(PageContent {
                requested_url: request.url.clone(),
                final_url,
                status: status.as_u16(),
                body,
                rendered: request.is_rendered(),
            })),
            Err(e) if e.is_timeout() => Ok(Attempt::Retry("body read timeout".to_string())),
            Err(e) => Ok(Attempt::Fail(FetchError::Http(e))),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    /// Fetches a URL with robots checks, throttling and retry
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 5xx / 429 | Retry up to `retry-times`, linear backoff |
    /// | Timeout / connect error | Retry up to `retry-times`, linear backoff |
    /// | Other non-2xx | Immediate `Status` error |
    /// | Robots disallow | Immediate `RobotsDenied` |
    async fn fetch(&self, request: &FetchRequest) -> Result<PageContent, FetchError> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(request.url.to_string()));
        }

        if self.obey_robots
            && !self
                .robots
                .is_allowed(&self.client, &request.url, &self.user_agent)
                .await
        {
            return Err(FetchError::RobotsDenied(request.url.to_string()));
        }

        let max_attempts = self.retry_times + 1;
        let mut last_message = String::new();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_backoff * attempt).await;
            }

            match self.attempt(request).await? {
                Attempt::Done(content) => {
                    debug!(
                        url = %request.url,
                        rendered = content.rendered,
                        "Fetched {} bytes",
                        content.body.len()
                    );
                    return Ok(content);
                }
                Attempt::Fail(error) => return Err(error),
                Attempt::Retry(message) => {
                    warn!(
                        url = %request.url,
                        "Attempt {}/{} failed: {}",
                        attempt + 1,
                        max_attempts,
                        message
                    );
                    last_message = message;
                }
            }
        }

        Err(FetchError::Transient {
            url: request.url.to_string(),
            attempts: max_attempts,
            message: last_message,
        })
    }
}
