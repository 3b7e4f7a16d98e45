//! Crawler coordinator - session orchestration
//!
//! This module drives one crawl session:
//! - Walking listing branches (search terms or category pages) page by page
//! - Claiming candidate product URLs against the session state
//! - Spawning one escalation task per claimed product
//! - Emitting assembled records to the product sink under the session cap

use crate::crawler::escalation::run_escalation;
use crate::crawler::{Fetch, FetchError, FetchRequest, PageContent};
use crate::page::Page;
use crate::record::assemble;
use crate::retailer::Retailer;
use crate::state::{Claim, CrawlSession, Seed};
use crate::storage::{ProductSink, SessionStatus, SinkOutcome};
use crate::url::canonical_product_url;
use crate::walker::{extract_candidate_links, find_next_page};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// Counters describing how a session went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Records handed to the sink
    pub emitted: usize,
    pub stored: usize,
    /// Records dropped by the storage validation gate
    pub rejected: usize,
    /// Records the sink failed to persist
    pub sink_failures: usize,
    /// Product URLs whose plain fetch failed
    pub abandoned: usize,
    /// Records finished after the cap was reached
    pub discarded: usize,
    pub escalations: usize,
    pub listing_pages: usize,
    pub bot_walls: usize,
    /// Listing fetches that failed
    pub listing_failures: usize,
}

impl CrawlReport {
    /// A session that fetched nothing but hit failures is marked failed
    pub fn status(&self) -> SessionStatus {
        let fetched = self.listing_pages + self.emitted + self.discarded;
        if fetched == 0 && (self.listing_failures > 0 || self.abandoned > 0) {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        }
    }

    fn record(&mut self, result: ProductResult) {
        if result.escalated {
            self.escalations += 1;
        }

        match result.outcome {
            ProductOutcome::Emitted(SinkOutcome::Stored(_)) => {
                self.emitted += 1;
                self.stored += 1;
            }
            ProductOutcome::Emitted(SinkOutcome::Rejected) => {
                self.emitted += 1;
                self.rejected += 1;
            }
            ProductOutcome::Emitted(SinkOutcome::Failed) => {
                self.emitted += 1;
                self.sink_failures += 1;
            }
            ProductOutcome::Discarded => self.discarded += 1,
            ProductOutcome::Abandoned => self.abandoned += 1,
        }
    }
}

#[derive(Debug)]
enum ProductOutcome {
    Emitted(SinkOutcome),
    Discarded,
    Abandoned,
}

#[derive(Debug)]
struct ProductResult {
    outcome: ProductOutcome,
    escalated: bool,
}

/// How a listing branch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchEnd {
    /// This branch has nothing more; later branches may continue
    Exhausted,
    /// A session-wide cap was reached; no branch may continue
    SessionLimit,
}

/// What a listing page yielded, computed without holding the DOM across an await
struct ListingScan {
    links: Vec<Url>,
    next_page: Option<Url>,
    bot_wall: bool,
}

fn scan_listing(retailer: &Retailer, content: PageContent) -> ListingScan {
    let page = Page::parse(content.final_url, content.body, content.rendered);

    if retailer.is_bot_wall(&page.lowercase_text()) {
        return ListingScan {
            links: Vec::new(),
            next_page: None,
            bot_wall: true,
        };
    }

    ListingScan {
        links: extract_candidate_links(retailer, &page),
        next_page: find_next_page(retailer, &page),
        bot_wall: false,
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    fetcher: Arc<dyn Fetch>,
    sink: Arc<dyn ProductSink>,
    retailer: Arc<Retailer>,
    session: Arc<CrawlSession>,
    tasks: JoinSet<ProductResult>,
    listing_seen: HashSet<Url>,
    report: CrawlReport,
}

impl Coordinator {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        sink: Arc<dyn ProductSink>,
        retailer: Arc<Retailer>,
        session: Arc<CrawlSession>,
    ) -> Self {
        Self {
            fetcher,
            sink,
            retailer,
            session,
            tasks: JoinSet::new(),
            listing_seen: HashSet::new(),
            report: CrawlReport::default(),
        }
    }

    /// Runs the session to completion and returns its report
    ///
    /// Listing branches are walked one after another; product tasks run concurrently,
    /// bounded by the fetcher's throttle. Every spawned task is awaited before returning.
    pub async fn run(mut self) -> CrawlReport {
        tracing::info!(
            store = %self.retailer.store(),
            "Starting crawl session: {}",
            self.session.seed()
        );

        match self.session.seed().clone() {
            Seed::ExplicitUrls(urls) => self.seed_products(urls),
            Seed::Query(terms) => {
                for term in terms {
                    let start = match self.retailer.search_url(&term) {
                        Ok(url) => url,
                        Err(e) => {
                            tracing::warn!("Cannot build search URL for '{}': {}", term, e);
                            self.report.listing_failures += 1;
                            continue;
                        }
                    };
                    if self.walk_branch(start).await == BranchEnd::SessionLimit {
                        break;
                    }
                }
            }
            Seed::CategoryUrls(urls) => {
                for start in urls {
                    if self.walk_branch(start).await == BranchEnd::SessionLimit {
                        break;
                    }
                }
            }
        }

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => self.report.record(result),
                Err(e) => tracing::error!("Product task failed: {}", e),
            }
        }

        let snapshot = self.session.snapshot();
        tracing::info!(
            store = %self.retailer.store(),
            "Crawl session finished: {} emitted ({} stored, {} rejected), {} listing pages, {} product URLs issued",
            self.report.emitted,
            self.report.stored,
            self.report.rejected,
            self.report.listing_pages,
            snapshot.issued_count
        );

        self.report
    }

    fn seed_products(&mut self, urls: Vec<Url>) {
        for url in urls {
            let url = match canonical_product_url(url.as_str()) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping product URL {}: {}", url, e);
                    continue;
                }
            };

            match self.session.claim_candidate(&url) {
                Claim::Claimed => self.spawn_product(url),
                Claim::Duplicate => tracing::debug!("Duplicate product URL {}", url),
                Claim::Capped => {
                    tracing::info!("Product cap reached, ignoring remaining product URLs");
                    break;
                }
            }
        }
    }

    async fn walk_branch(&mut self, start: Url) -> BranchEnd {
        let mut next = Some(start);

        while let Some(url) = next.take() {
            if !self.listing_seen.insert(url.clone()) {
                tracing::debug!("Listing page {} already visited, ending branch", url);
                return BranchEnd::Exhausted;
            }

            let Some(page_number) = self.session.begin_listing_page() else {
                tracing::info!("Session limit reached, no further listing pages");
                return BranchEnd::SessionLimit;
            };

            tracing::debug!("Fetching listing page {} ({})", page_number, url);

            let content = match self.fetch_listing(&url).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(url = %url, "Listing fetch failed: {}", e);
                    self.report.listing_failures += 1;
                    return BranchEnd::Exhausted;
                }
            };
            self.report.listing_pages += 1;

            let scan = scan_listing(&self.retailer, content);

            if scan.bot_wall {
                tracing::warn!(url = %url, "Bot wall detected, ending branch");
                self.report.bot_walls += 1;
                return BranchEnd::Exhausted;
            }

            if scan.links.is_empty() {
                tracing::info!(url = %url, "No product links found, ending branch");
                return BranchEnd::Exhausted;
            }

            let mut claimed = 0;
            for link in scan.links {
                match self.session.claim_candidate(&link) {
                    Claim::Claimed => {
                        tracing::debug!("Candidate product {}", link);
                        self.spawn_product(link);
                        claimed += 1;
                    }
                    Claim::Duplicate => {}
                    Claim::Capped => {
                        tracing::info!("Product cap reached, stopping pagination");
                        return BranchEnd::SessionLimit;
                    }
                }
            }

            if claimed == 0 {
                tracing::info!(url = %url, "No new product links, ending branch");
                return BranchEnd::Exhausted;
            }

            next = scan.next_page;
            if next.is_none() {
                tracing::debug!("No next page after {}", url);
            }
        }

        BranchEnd::Exhausted
    }

    /// Fetches a listing page, rendered when the retailer needs it
    ///
    /// Without a renderer the page is fetched plain.
    async fn fetch_listing(&self, url: &Url) -> Result<PageContent, FetchError> {
        if self.retailer.requires_rendering() {
            let request = FetchRequest::rendered(
                url.clone(),
                self.retailer.config().listing_wait_selector.clone(),
            );

            match self.fetcher.fetch(&request).await {
                Err(FetchError::RenderingUnavailable(_)) => {
                    tracing::warn!("Rendering unavailable, fetching listing {} plain", url);
                }
                other => return other,
            }
        }

        self.fetcher.fetch(&FetchRequest::plain(url.clone())).await
    }

    fn spawn_product(&mut self, url: Url) {
        let fetcher = Arc::clone(&self.fetcher);
        let sink = Arc::clone(&self.sink);
        let retailer = Arc::clone(&self.retailer);
        let session = Arc::clone(&self.session);

        self.tasks
            .spawn(async move { process_product(fetcher, sink, retailer, session, url).await });
    }
}

async fn process_product(
    fetcher: Arc<dyn Fetch>,
    sink: Arc<dyn ProductSink>,
    retailer: Arc<Retailer>,
    session: Arc<CrawlSession>,
    url: Url,
) -> ProductResult {
    let outcome = match run_escalation(fetcher.as_ref(), &retailer, &url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(url = %url, "Abandoning product: {}", e);
            return ProductResult {
                outcome: ProductOutcome::Abandoned,
                escalated: false,
            };
        }
    };

    let escalated = outcome.was_escalated();
    let record = assemble(&retailer, &url, outcome.record, Utc::now());

    if !session.try_emit() {
        tracing::debug!(url = %url, "Product cap reached, discarding record");
        return ProductResult {
            outcome: ProductOutcome::Discarded,
            escalated,
        };
    }

    ProductResult {
        outcome: ProductOutcome::Emitted(sink.accept(record).await),
        escalated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ScriptedFetcher;
    use crate::record::ProductRecord;
    use crate::retailer::{RetailerConfig, RetailerTable};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sink that keeps every record and rejects those without an image
    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<ProductRecord>>,
    }

    #[async_trait]
    impl ProductSink for MemorySink {
        async fn accept(&self, record: ProductRecord) -> SinkOutcome {
            let stored = record.image_url.is_some();
            let mut records = self.records.lock().unwrap();
            records.push(record);
            if stored {
                SinkOutcome::Stored(records.len() as i64)
            } else {
                SinkOutcome::Rejected
            }
        }
    }

    fn shop() -> Arc<Retailer> {
        let row = RetailerConfig {
            id: "shop".to_string(),
            link_selectors: vec!["a.card::attr(href)".to_string()],
            next_page_selectors: vec!["a.next".to_string()],
            price_selectors: vec![".price".to_string()],
            image_selectors: vec!["img.main::attr(src)".to_string()],
            product_url_pattern: Some(r"/p$".to_string()),
            base_search_url_template: Some("https://shop.example/s?q={query}".to_string()),
            bot_wall_markers: vec!["captcha".to_string()],
            ..RetailerConfig::default()
        };
        RetailerTable::build(&[row]).unwrap().get("shop").unwrap()
    }

    fn product(title: &str, price: &str) -> String {
        format!(
            r#"<html><body><h1>{title}</h1><span class="price">{price}</span><img class="main" src="/i.jpg"></body></html>"#
        )
    }

    fn listing(items: &[&str], next: Option<&str>) -> String {
        let anchors: String = items
            .iter()
            .map(|i| format!(r#"<a class="card" href="/{i}/p">{i}</a>"#))
            .collect();
        let next = next
            .map(|n| format!(r#"<a class="next" href="{n}">next</a>"#))
            .unwrap_or_default();
        format!("<html><body>{anchors}{next}</body></html>")
    }

    async fn run(
        fetcher: ScriptedFetcher,
        seed: Seed,
        max_products: Option<usize>,
        max_pages: Option<usize>,
    ) -> (Arc<ScriptedFetcher>, Arc<MemorySink>, CrawlReport) {
        let fetcher = Arc::new(fetcher);
        let sink = Arc::new(MemorySink::default());
        let session = Arc::new(CrawlSession::new(seed, max_products, max_pages));
        let report = Coordinator::new(fetcher.clone(), sink.clone(), shop(), session)
            .run()
            .await;
        (fetcher, sink, report)
    }

    fn query() -> Seed {
        Seed::Query(vec!["cafe".to_string()])
    }

    #[tokio::test]
    async fn test_walks_pages_until_no_next() {
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/s?q=cafe", listing(&["a", "b"], Some("/s/2?q=cafe")))
            .page("https://shop.example/s/2?q=cafe", listing(&["c"], None))
            .page("https://shop.example/a/p", product("A", "$10.00"))
            .page("https://shop.example/b/p", product("B", "$11.00"))
            .page("https://shop.example/c/p", product("C", "$12.00"));

        let (fetcher, sink, report) = run(fetcher, query(), None, None).await;

        assert_eq!(report.listing_pages, 2);
        assert_eq!(report.emitted, 3);
        assert_eq!(report.stored, 3);
        assert_eq!(report.escalations, 0);
        assert_eq!(fetcher.requests().len(), 5);
        assert_eq!(sink.records.lock().unwrap().len(), 3);
        assert_eq!(report.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicate_links_fetched_once() {
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/s?q=cafe", listing(&["a", "a", "b"], Some("/s/2?q=cafe")))
            .page("https://shop.example/s/2?q=cafe", listing(&["a", "b"], None))
            .page("https://shop.example/a/p", product("A", "$10.00"))
            .page("https://shop.example/b/p", product("B", "$11.00"));

        let (fetcher, _, report) = run(fetcher, query(), None, None).await;

        assert_eq!(fetcher.count_for("https://shop.example/a/p"), 1);
        assert_eq!(report.emitted, 2);
    }

    #[tokio::test]
    async fn test_bot_wall_ends_branch() {
        let fetcher = ScriptedFetcher::new().page(
            "https://shop.example/s?q=cafe",
            "<html><body>Please solve the CAPTCHA <a class=\"card\" href=\"/a/p\">a</a></body></html>",
        );

        let (fetcher, _, report) = run(fetcher, query(), None, None).await;

        assert_eq!(report.bot_walls, 1);
        assert_eq!(report.emitted, 0);
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_urls_bypass_walker() {
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/a/p", product("A", "$10.00"))
            .failure("https://shop.example/b/p");

        let seed = Seed::ExplicitUrls(vec![
            Url::parse("https://shop.example/a/p?utm_source=x").unwrap(),
            Url::parse("https://shop.example/a/p").unwrap(),
            Url::parse("https://shop.example/b/p").unwrap(),
        ]);
        let (fetcher, _, report) = run(fetcher, seed, None, None).await;

        assert_eq!(report.listing_pages, 0);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.abandoned, 1);
        assert_eq!(fetcher.count_for("https://shop.example/a/p"), 1);
    }

    #[tokio::test]
    async fn test_empty_product_page_is_emitted_not_abandoned() {
        let fetcher = ScriptedFetcher::new().page(
            "https://shop.example/a/p",
            "<html><body><p>nothing here</p></body></html>",
        );
        let seed = Seed::ExplicitUrls(vec![Url::parse("https://shop.example/a/p").unwrap()]);

        let (fetcher, sink, report) = run(fetcher, seed, None, None).await;

        assert_eq!(report.abandoned, 0);
        assert_eq!(report.escalations, 1);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(fetcher.requests().len(), 2);
        assert_eq!(sink.records.lock().unwrap()[0].price, None);
    }

    #[tokio::test]
    async fn test_all_failures_mark_session_failed() {
        let fetcher = ScriptedFetcher::new().failure("https://shop.example/s?q=cafe");
        let (_, _, report) = run(fetcher, query(), None, None).await;

        assert_eq!(report.listing_failures, 1);
        assert_eq!(report.status(), SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_query_terms_share_session_cap() {
        let fetcher = ScriptedFetcher::new()
            .page("https://shop.example/s?q=cafe", listing(&["a", "b"], None))
            .page("https://shop.example/s?q=azucar", listing(&["c", "d"], None))
            .page("https://shop.example/a/p", product("A", "$1.00"))
            .page("https://shop.example/b/p", product("B", "$1.00"))
            .page("https://shop.example/c/p", product("C", "$1.00"))
            .page("https://shop.example/d/p", product("D", "$1.00"));

        let seed = Seed::Query(vec!["cafe".to_string(), "azucar".to_string()]);
        let (fetcher, _, report) = run(fetcher, seed, Some(3), None).await;

        assert_eq!(report.emitted, 3);
        assert_eq!(fetcher.count_for("https://shop.example/d/p"), 0);
    }
}
