//! Integration tests for crawl sessions
//!
//! Most scenarios run a full session against a scripted fetcher so that every issued
//! request can be counted; one test drives the real HTTP fetcher against wiremock.

use rust_decimal::Decimal;
use shelf_tracker::config::Config;
use shelf_tracker::crawler::{
    run_crawl, run_crawl_with, run_escalation, CrawlOptions, CrawlSummary, ScriptedFetcher,
};
use shelf_tracker::retailer::{RetailerConfig, RetailerTable};
use shelf_tracker::storage::{SessionStatus, SqliteStorage, Storage};
use shelf_tracker::TrackerError;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH: &str = "https://shop.example/buscar?q=cafe";

/// A retailer row in the shape of the built-in ones, pointed at a test host
fn shop_row(host: &str) -> RetailerConfig {
    RetailerConfig {
        id: "shop".to_string(),
        link_selectors: vec!["a.card::attr(href)".to_string()],
        next_page_selectors: vec!["a.next::attr(href)".to_string()],
        price_selectors: vec!["span.price::text".to_string()],
        image_selectors: vec!["img.main::attr(src)".to_string()],
        non_product_path_markers: vec!["/blog/".to_string()],
        product_url_pattern: Some(r"/p$".to_string()),
        base_search_url_template: Some(format!("{host}/buscar?q={{query}}")),
        render_wait_selector: Some("span.price".to_string()),
        ..RetailerConfig::default()
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.download_delay_ms = 0;
    config.fetch.retry_times = 0;
    config.retailers = vec![shop_row("https://shop.example")];
    config
}

fn listing(items: &[&str], next: Option<&str>) -> String {
    let cards: String = items
        .iter()
        .map(|item| format!(r#"<div><a class="card" href="/{item}/p">{item}</a></div>"#))
        .collect();
    let next = next
        .map(|n| format!(r#"<a class="next" href="{n}">Siguiente</a>"#))
        .unwrap_or_default();
    format!("<html><body>{cards}{next}</body></html>")
}

fn product(title: &str, price: &str) -> String {
    format!(
        r#"<html><body>
        <h1>{title}</h1>
        <span class="price">{price}</span>
        <img class="main" src="/img/{title}.jpg">
        </body></html>"#
    )
}

fn options(max_products: Option<usize>, max_pages: Option<usize>) -> CrawlOptions {
    CrawlOptions {
        store: "shop".to_string(),
        query: Some("cafe".to_string()),
        max_products,
        max_pages,
        ..CrawlOptions::default()
    }
}

async fn run_scripted(
    fetcher: ScriptedFetcher,
    options: CrawlOptions,
) -> (Arc<ScriptedFetcher>, Arc<Mutex<SqliteStorage>>, CrawlSummary) {
    let fetcher = Arc::new(fetcher);
    let storage = Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()));

    let summary = run_crawl_with(
        fetcher.clone(),
        Arc::clone(&storage),
        &test_config(),
        "test-hash",
        options,
    )
    .await
    .expect("crawl should run");

    (fetcher, storage, summary)
}

fn listing_fetches(fetcher: &ScriptedFetcher) -> usize {
    fetcher
        .requests()
        .iter()
        .filter(|r| r.url.path().starts_with("/buscar"))
        .count()
}

#[tokio::test]
async fn test_product_cap_limits_fetches() {
    let fetcher = ScriptedFetcher::new()
        .page(SEARCH, listing(&["uno", "dos", "tres"], None))
        .page("https://shop.example/uno/p", product("uno", "$10.00"))
        .page("https://shop.example/dos/p", product("dos", "$20.00"))
        .page("https://shop.example/tres/p", product("tres", "$30.00"));

    let (fetcher, storage, summary) = run_scripted(fetcher, options(Some(2), None)).await;

    assert_eq!(fetcher.count_matching("/p"), 2);
    assert_eq!(fetcher.count_for("https://shop.example/tres/p"), 0);
    assert_eq!(summary.report.emitted, 2);
    assert_eq!(storage.lock().await.count_products().unwrap(), 2);
}

#[tokio::test]
async fn test_structured_price_needs_no_escalation() {
    let url = "https://shop.example/aceite/p";
    let body = r#"<html><head>
        <meta property="og:image" content="https://shop.example/img/aceite.jpg">
        <script type="application/ld+json">
        {"@context":"https://schema.org","@type":"Product","name":"Aceite 1 L",
         "offers":{"@type":"Offer","price":"199.90","priceCurrency":"MXN"}}
        </script></head><body><h1>Aceite 1 L</h1></body></html>"#;

    let fetcher = ScriptedFetcher::new().page(url, body);
    let table = RetailerTable::build(&[shop_row("https://shop.example")]).unwrap();
    let retailer = table.get("shop").unwrap();

    let outcome = run_escalation(&fetcher, &retailer, &Url::parse(url).unwrap())
        .await
        .unwrap();
    let record = outcome.record;

    assert_eq!(record.price, Some(Decimal::from_str("199.90").unwrap()));
    assert_eq!(record.price_raw, None);
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(fetcher.rendered_count(), 0);

    let fetcher = ScriptedFetcher::new()
        .page(SEARCH, listing(&["aceite"], None))
        .page(url, body);
    let (fetcher, storage, _) = run_scripted(fetcher, options(None, None)).await;

    let stored = storage.lock().await.list_products().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].price, Decimal::from_str("199.90").unwrap());
    assert_eq!(fetcher.rendered_count(), 0);
}

#[tokio::test]
async fn test_missing_price_escalates_once() {
    let url = "https://shop.example/descontinuado/p";
    let body = r#"<html><body><h1>Descontinuado</h1><img class="main" src="/d.jpg"></body></html>"#;

    let fetcher = ScriptedFetcher::new()
        .page(SEARCH, listing(&["descontinuado"], None))
        .page(url, body);

    let (fetcher, storage, summary) = run_scripted(fetcher, options(None, None)).await;

    assert_eq!(fetcher.count_for(url), 2);
    assert_eq!(fetcher.rendered_count(), 1);

    let rendered = fetcher
        .requests()
        .into_iter()
        .find(|r| r.is_rendered())
        .unwrap();
    assert_eq!(rendered.wait_for.as_deref(), Some("span.price"));

    // Emitted with a null price, then dropped by the validation gate
    assert_eq!(summary.report.escalations, 1);
    assert_eq!(summary.report.emitted, 1);
    assert_eq!(summary.report.rejected, 1);
    assert_eq!(storage.lock().await.count_products().unwrap(), 0);
}

#[tokio::test]
async fn test_rendered_price_is_used() {
    let url = "https://shop.example/cafe-molido/p";
    let fetcher = ScriptedFetcher::new()
        .page(SEARCH, listing(&["cafe-molido"], None))
        .page(
            url,
            r#"<html><body><h1>Café molido</h1><img class="main" src="/c.jpg"></body></html>"#,
        )
        .rendered_page(url, product("cafe-molido", "$ 1,234.50"));

    let (_, storage, summary) = run_scripted(fetcher, options(None, None)).await;

    assert_eq!(summary.report.stored, 1);
    let stored = storage.lock().await.list_products().unwrap();
    assert_eq!(stored[0].price, Decimal::from_str("1234.50").unwrap());
}

#[tokio::test]
async fn test_missing_image_is_dropped_silently() {
    let url = "https://shop.example/sin-imagen/p";
    let fetcher = ScriptedFetcher::new()
        .page(SEARCH, listing(&["sin-imagen"], None))
        .page(
            url,
            r#"<html><body><h1>Sin imagen</h1><span class="price">$15.00</span></body></html>"#,
        );

    let (_, storage, summary) = run_scripted(fetcher, options(None, None)).await;

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.report.rejected, 1);

    let storage = storage.lock().await;
    assert_eq!(storage.count_products().unwrap(), 0);
    let session = storage.get_session(summary.session_id).unwrap();
    assert_eq!(session.rejected_count, 1);
    assert_eq!(session.emitted_count, 1);
}

#[tokio::test]
async fn test_pagination_halts_without_next_page() {
    let fetcher = ScriptedFetcher::new()
        .page(SEARCH, listing(&["a"], Some("/buscar/2?q=cafe")))
        .page("https://shop.example/buscar/2?q=cafe", listing(&["b"], None))
        .page("https://shop.example/a/p", product("a", "$1.00"))
        .page("https://shop.example/b/p", product("b", "$2.00"));

    let (fetcher, _, summary) = run_scripted(fetcher, options(Some(0), None)).await;

    assert_eq!(listing_fetches(&fetcher), 2);
    assert_eq!(summary.report.listing_pages, 2);
    assert_eq!(summary.report.stored, 2);
}

#[tokio::test]
async fn test_pagination_halts_at_max_pages() {
    let mut fetcher = ScriptedFetcher::new();
    for n in 1..=5 {
        let page_url = if n == 1 {
            SEARCH.to_string()
        } else {
            format!("https://shop.example/buscar/{n}?q=cafe")
        };
        let item = format!("item-{n}");
        fetcher = fetcher
            .page(
                &page_url,
                listing(&[item.as_str()], Some(&format!("/buscar/{}?q=cafe", n + 1))),
            )
            .page(
                &format!("https://shop.example/{item}/p"),
                product(&item, "$5.00"),
            );
    }

    let (fetcher, _, summary) = run_scripted(fetcher, options(Some(0), Some(2))).await;

    assert_eq!(listing_fetches(&fetcher), 2);
    assert_eq!(summary.report.listing_pages, 2);
    assert_eq!(summary.report.emitted, 2);
}

#[tokio::test]
async fn test_pagination_halts_at_max_products() {
    let fetcher = ScriptedFetcher::new()
        .page(SEARCH, listing(&["a", "b"], Some("/buscar/2?q=cafe")))
        .page("https://shop.example/buscar/2?q=cafe", listing(&["c", "d"], None))
        .page("https://shop.example/a/p", product("a", "$1.00"))
        .page("https://shop.example/b/p", product("b", "$2.00"));

    let (fetcher, _, summary) = run_scripted(fetcher, options(Some(2), None)).await;

    assert_eq!(listing_fetches(&fetcher), 1);
    assert_eq!(summary.report.emitted, 2);
}

#[tokio::test]
async fn test_emitted_never_exceeds_cap() {
    let items: Vec<String> = (0..12).map(|n| format!("p{n}")).collect();
    let refs: Vec<&str> = items.iter().map(String::as_str).collect();

    let mut fetcher = ScriptedFetcher::new().page(SEARCH, listing(&refs, None));
    for item in &items {
        fetcher = fetcher.page(
            &format!("https://shop.example/{item}/p"),
            product(item, "$9.90"),
        );
    }

    let (fetcher, storage, summary) = run_scripted(fetcher, options(Some(5), None)).await;

    assert_eq!(summary.report.emitted, 5);
    assert_eq!(fetcher.count_matching("/p"), 5);
    assert_eq!(storage.lock().await.count_products().unwrap(), 5);
}

#[tokio::test]
async fn test_missing_seed_fails_before_session() {
    let mut config = test_config();
    config.retailers[0].base_search_url_template = None;
    let storage = Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()));

    let result = run_crawl_with(
        Arc::new(ScriptedFetcher::new()),
        Arc::clone(&storage),
        &config,
        "hash",
        CrawlOptions {
            store: "shop".to_string(),
            ..CrawlOptions::default()
        },
    )
    .await;

    assert!(matches!(result, Err(TrackerError::MissingSeed { .. })));
    assert!(storage.lock().await.latest_sessions(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_store() {
    let storage = Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()));
    let result = run_crawl_with(
        Arc::new(ScriptedFetcher::new()),
        storage,
        &test_config(),
        "hash",
        CrawlOptions {
            store: "chedraui".to_string(),
            query: Some("cafe".to_string()),
            ..CrawlOptions::default()
        },
    )
    .await;

    assert!(matches!(result, Err(TrackerError::UnknownRetailer(s)) if s == "chedraui"));
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /blog/\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/buscar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
            <a class="card" href="/harina/p">Harina</a>
            <a class="card" href="{base}/azucar/p?utm_source=feed">Azúcar</a>
            <a class="card" href="/sin-precio/p">Sin precio</a>
            <a class="card" href="/blog/receta/p">Receta</a>
            </body></html>"#
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/harina/p"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product("harina", "$25.50")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/azucar/p"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product("azucar", "$31.00")))
        .expect(1)
        .mount(&server)
        .await;

    // No render endpoint: the single plain fetch is final
    Mock::given(method("GET"))
        .and(path("/sin-precio/p"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><h1>Sin precio</h1><img class="main" src="/x.jpg"></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("shelf.db");

    let mut config = test_config();
    config.retailers = vec![shop_row(&base)];
    config.output.database_path = db_path.to_string_lossy().to_string();

    let summary = run_crawl(&config, "hash", options(None, None)).await.unwrap();

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.report.emitted, 3);
    assert_eq!(summary.report.stored, 2);
    assert_eq!(summary.report.rejected, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let mut titles: Vec<String> = storage
        .list_products()
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["azucar", "harina"]);

    let session = storage.get_session(summary.session_id).unwrap();
    assert_eq!(session.config_hash, "hash");
    assert_eq!(session.seed, "query: cafe");
}
