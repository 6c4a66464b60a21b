pub mod approvals;
pub mod stock;
pub mod transfers;
pub mod variants;
pub mod warehouses;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;

use crate::AppState;

/// Composes the full API surface.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api-docs/openapi.json", get(crate::openapi::openapi_json))
        .nest("/api/v1/warehouses", warehouses::router())
        .nest("/api/v1/variants", variants::router())
        .nest("/api/v1/stock", stock::router())
        .nest("/api/v1/transfers", transfers::router())
        .nest("/api/v1/approvals", approvals::router())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    match encoder.encode(&families, &mut buffer) {
        Ok(()) => (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned()).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {}", e),
        )
            .into_response(),
    }
}
