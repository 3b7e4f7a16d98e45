//! Route definitions of the query API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;
use super::AppState;

/// Creates the API router with all routes mounted under `/api`
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/products", get(handlers::list_products))
        .route("/crawls", post(handlers::start_crawl))
        .with_state(state);

    Router::new().nest("/api", api)
}
