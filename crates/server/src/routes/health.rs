use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Health check endpoint (liveness)
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "binfp-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness check endpoint
///
/// The model is loaded before the listener binds, so a running server is ready to embed.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let retrieval = state.retriever.config();
    Json(json!({
        "status": "ready",
        "service": "binfp-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "components": {
            "encoder": state.pipeline.encoder_name(),
            "embedding_dim": state.pipeline.dim(),
            "fingerprint_bytes": state.pipeline.fingerprint_len(),
            "search_url": retrieval.find_matches_url(),
            "remote_embedding": retrieval.embed_url.is_some(),
        }
    }))
}

/// Pipeline and request counters as JSON
pub async fn metrics(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "uptime_seconds": uptime_seconds(),
        "counters": state.counters.snapshot(),
    }))
}

/// Prometheus text exposition, when the recorder is installed
pub async fn prometheus(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.prometheus.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
