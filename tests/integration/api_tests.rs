//! Integration tests for the query API and crawl trigger
//!
//! Each test binds the router on an ephemeral port and talks to it over HTTP.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shelf_tracker::api::{self, AppState, CrawlJob, CrawlLauncher};
use shelf_tracker::record::{ProductRecord, StoreTag};
use shelf_tracker::retailer::RetailerTable;
use shelf_tracker::storage::{SqliteStorage, Storage};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use url::Url;

/// Launcher that only records what it was asked to start
#[derive(Default)]
struct RecordingLauncher {
    jobs: StdMutex<Vec<CrawlJob>>,
}

impl CrawlLauncher for RecordingLauncher {
    fn launch(&self, job: CrawlJob) -> shelf_tracker::Result<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

fn record(store: &str, title: &str, price: i64, minutes_ago: i64) -> ProductRecord {
    ProductRecord {
        store: StoreTag::new(store),
        url: Url::parse(&format!("https://www.{store}.com.mx/{title}/p")).unwrap(),
        title: title.to_string(),
        sku: None,
        price: Some(Decimal::new(price, 2)),
        price_raw: None,
        currency: "MXN".to_string(),
        in_stock: Some(true),
        image_url: Some(format!("https://img.example/{title}.jpg")),
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
    }
}

async fn start_server() -> (SocketAddr, Arc<RecordingLauncher>) {
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    let session = storage
        .create_session("heb", "query: cafe", "hash", Some(10))
        .unwrap();
    storage
        .persist_product(session, &record("heb", "viejo", 1000, 30))
        .unwrap();
    storage
        .persist_product(session, &record("soriana", "nuevo", 2550, 1))
        .unwrap();
    storage
        .persist_product(session, &record("walmart", "medio", 999, 10))
        .unwrap();

    let launcher = Arc::new(RecordingLauncher::default());
    let state = AppState {
        storage: Arc::new(Mutex::new(storage)),
        retailers: Arc::new(RetailerTable::build(&[]).unwrap()),
        launcher: launcher.clone(),
        default_max_products: 100,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(api::serve(listener, state));

    (addr, launcher)
}

#[tokio::test]
async fn test_health() {
    let (addr, _) = start_server().await;

    let response = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_products_newest_first() {
    let (addr, _) = start_server().await;

    let body: Value = reqwest::get(format!("http://{addr}/api/products"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["nuevo", "medio", "viejo"]);

    let first = &body[0];
    assert_eq!(first["store"], "soriana");
    assert_eq!(first["image_url"], "https://img.example/nuevo.jpg");
    assert!(first["id"].is_i64());
    assert!(first["captured_at"].is_string());
}

#[tokio::test]
async fn test_products_limit() {
    let (addr, _) = start_server().await;

    let body: Value = reqwest::get(format!("http://{addr}/api/products?limit=1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "nuevo");
}

#[tokio::test]
async fn test_start_crawl_is_acknowledged() {
    let (addr, launcher) = start_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/crawls"))
        .json(&json!({ "target": "Soriana", "query": "aceite de oliva", "max_products": 15 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 202);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["target"], "soriana");

    let jobs = launcher.jobs.lock().unwrap().clone();
    assert_eq!(
        jobs,
        vec![CrawlJob {
            store: "soriana".to_string(),
            query: "aceite de oliva".to_string(),
            max_products: 15,
        }]
    );
}

#[tokio::test]
async fn test_start_crawl_default_max_products() {
    let (addr, launcher) = start_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/crawls"))
        .json(&json!({ "target": "heb", "query": "harina" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 202);
    assert_eq!(launcher.jobs.lock().unwrap()[0].max_products, 100);
}

#[tokio::test]
async fn test_start_crawl_rejects_bad_requests() {
    let (addr, launcher) = start_server().await;
    let client = reqwest::Client::new();

    let unknown = client
        .post(format!("http://{addr}/api/crawls"))
        .json(&json!({ "target": "chedraui", "query": "cafe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 400);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["code"], "UNKNOWN_TARGET");

    let empty = client
        .post(format!("http://{addr}/api/crawls"))
        .json(&json!({ "target": "heb", "query": " , " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    assert!(launcher.jobs.lock().unwrap().is_empty());
}
