//! API route handlers
//!
//! - `embed`: text to binary fingerprint (and optionally the dense vector)
//! - `search`: embed, search and hydrate
//! - `health`: liveness, readiness and metrics

pub mod embed;
pub mod health;
pub mod search;

use crate::error::{ServerError, ServerResult};
use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;

/// API version and base info (`GET /`).
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "binfp server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /embed",
            "POST /search",
            "GET /health",
            "GET /ready",
            "GET /metrics",
            "GET /metrics/prometheus"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
