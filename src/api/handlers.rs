//! Request handlers: products, crawl trigger, health

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::launcher::CrawlJob;
use super::types::*;
use super::AppState;
use crate::state::split_query;
use crate::storage::Storage;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(code, message))).into_response()
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Stored products, newest capture first
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductsQuery>,
) -> Response {
    let storage = state.storage.lock().await;
    let products = match params.limit {
        Some(limit) => storage.list_products_limited(limit),
        None => storage.list_products(),
    };

    match products {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(e) => {
            tracing::error!("Failed to list products: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Failed to read products",
            )
        }
    }
}

/// Starts a crawl session in the background and acknowledges it
pub async fn start_crawl(
    State(state): State<AppState>,
    Json(request): Json<CrawlRequest>,
) -> Response {
    let Some(retailer) = state.retailers.get(&request.target) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "UNKNOWN_TARGET",
            format!(
                "Unknown target '{}'; expected one of: {}",
                request.target,
                state.retailers.ids().join(", ")
            ),
        );
    };

    if split_query(&request.query).is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "EMPTY_QUERY", "A query is required");
    }

    let job = CrawlJob {
        store: retailer.id().to_string(),
        query: request.query.trim().to_string(),
        max_products: request.max_products.unwrap_or(state.default_max_products),
    };

    tracing::debug!(
        "Crawl request: {} '{}' (max {})",
        job.store,
        job.query,
        job.max_products
    );

    let accepted = CrawlAccepted {
        status: "accepted".to_string(),
        target: job.store.clone(),
        query: job.query.clone(),
        max_products: job.max_products,
    };

    match state.launcher.launch(job) {
        Ok(()) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(e) => {
            tracing::error!("Failed to launch crawl: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "LAUNCH_FAILED",
                "Failed to start crawl",
            )
        }
    }
}
