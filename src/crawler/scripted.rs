//! In-memory fetch collaborator
//!
//! [`ScriptedFetcher`] serves canned pages and records every request it receives. The
//! crawl tests use it to count fetches and escalations without a network.

use crate::crawler::{Fetch, FetchError, FetchMode, FetchRequest, PageContent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
enum Scripted {
    Body(String),
    Status(u16),
    Transient,
}

/// Fetch collaborator answering from a fixed script
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    plain: HashMap<String, Scripted>,
    rendered: HashMap<String, Scripted>,
    renderer_available: bool,
    requests: Mutex<Vec<FetchRequest>>,
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl ScriptedFetcher {
    /// Creates an empty script with a working renderer
    pub fn new() -> Self {
        Self {
            renderer_available: true,
            ..Self::default()
        }
    }

    /// Serves `body` for plain fetches of `url`
    ///
    /// A rendered fetch of a URL without its own rendered body gets this body back.
    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.plain.insert(key(url), Scripted::Body(body.into()));
        self
    }

    /// Serves `body` for rendered fetches of `url`
    pub fn rendered_page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.rendered.insert(key(url), Scripted::Body(body.into()));
        self
    }

    /// Answers every fetch of `url` with an HTTP status error
    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.plain.insert(key(url), Scripted::Status(status));
        self.rendered.insert(key(url), Scripted::Status(status));
        self
    }

    /// Answers every fetch of `url` with an exhausted-retries error
    pub fn failure(mut self, url: &str) -> Self {
        self.plain.insert(key(url), Scripted::Transient);
        self.rendered.insert(key(url), Scripted::Transient);
        self
    }

    /// Makes every rendered fetch fail with [`FetchError::RenderingUnavailable`]
    pub fn without_renderer(mut self) -> Self {
        self.renderer_available = false;
        self
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of requests (plain or rendered) for one URL
    pub fn count_for(&self, url: &str) -> usize {
        let wanted = key(url);
        self.requests()
            .iter()
            .filter(|r| r.url.as_str() == wanted)
            .count()
    }

    pub fn rendered_count(&self) -> usize {
        self.requests().iter().filter(|r| r.is_rendered()).count()
    }

    /// Number of requests for URLs whose path ends with `suffix`
    pub fn count_matching(&self, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.path().ends_with(suffix))
            .count()
    }

    fn lookup(&self, request: &FetchRequest) -> Option<Scripted> {
        let k = request.url.to_string();
        match request.mode {
            FetchMode::Plain => self.plain.get(&k).cloned(),
            FetchMode::Rendered => self
                .rendered
                .get(&k)
                .or_else(|| self.plain.get(&k))
                .cloned(),
        }
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<PageContent, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if request.is_rendered() && !self.renderer_available {
            return Err(FetchError::RenderingUnavailable(request.url.to_string()));
        }

        match self.lookup(request) {
            Some(Scripted::Body(body)) => Ok(PageContent {
                requested_url: request.url.clone(),
                final_url: request.url.clone(),
                status: 200,
                body,
                rendered: request.is_rendered(),
            }),
            Some(Scripted::Status(status)) => Err(FetchError::Status {
                url: request.url.to_string(),
                status,
            }),
            Some(Scripted::Transient) => Err(FetchError::Transient {
                url: request.url.to_string(),
                attempts: 1,
                message: "scripted failure".to_string(),
            }),
            None => Err(FetchError::Status {
                url: request.url.to_string(),
                status: 404,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> FetchRequest {
        FetchRequest::plain(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_serves_pages_and_records_requests() {
        let fetcher = ScriptedFetcher::new().page("https://shop.example/a", "<p>a</p>");

        let content = fetcher.fetch(&request("https://shop.example/a")).await.unwrap();
        assert_eq!(content.body, "<p>a</p>");
        assert!(!content.rendered);

        let missing = fetcher.fetch(&request("https://shop.example/b")).await;
        assert!(matches!(missing, Err(FetchError::Status { status: 404, .. })));

        assert_eq!(fetcher.requests().len(), 2);
        assert_eq!(fetcher.count_for("https://shop.example/a"), 1);
    }

    #[tokio::test]
    async fn test_rendered_falls_back_to_plain_body() {
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/a", "plain")
            .page("https://shop.example/b", "plain b")
            .rendered_page("https://shop.example/b", "rendered b");

        let url_a = Url::parse("https://shop.example/a").unwrap();
        let url_b = Url::parse("https://shop.example/b").unwrap();

        let a = fetcher.fetch(&FetchRequest::rendered(url_a, None)).await.unwrap();
        let b = fetcher.fetch(&FetchRequest::rendered(url_b, None)).await.unwrap();

        assert_eq!(a.body, "plain");
        assert!(a.rendered);
        assert_eq!(b.body, "rendered b");
        assert_eq!(fetcher.rendered_count(), 2);
    }

    #[tokio::test]
    async fn test_without_renderer() {
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/a", "plain")
            .without_renderer();
        let url = Url::parse("https://shop.example/a").unwrap();

        assert!(fetcher.fetch(&FetchRequest::plain(url.clone())).await.is_ok());
        assert!(matches!(
            fetcher.fetch(&FetchRequest::rendered(url, None)).await,
            Err(FetchError::RenderingUnavailable(_))
        ));
    }
}
