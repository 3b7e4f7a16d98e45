//! Query API and crawl trigger
//!
//! Serves stored products over HTTP and accepts crawl requests, which are handed to a
//! [`CrawlLauncher`] without waiting for the crawl to finish.

pub mod handlers;
pub mod launcher;
pub mod routes;
pub mod types;

pub use launcher::{CrawlJob, CrawlLauncher, ProcessLauncher, TaskLauncher};
pub use routes::create_router;
pub use types::{CrawlAccepted, CrawlRequest, ErrorResponse, HealthResponse};

use crate::retailer::RetailerTable;
use crate::storage::SqliteStorage;
use crate::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub retailers: Arc<RetailerTable>,
    pub launcher: Arc<dyn CrawlLauncher>,
    /// Used when a crawl request omits `max_products`
    pub default_max_products: usize,
}

/// Serves the API on an already bound listener until the task is cancelled
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Query API listening on http://{}", addr);

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

/// Binds `addr` and serves the API
pub async fn bind_and_serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}
