use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use binfp::BinaryFingerprint;
use retrieval::{HydratedRecord, RetrievalQuery};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Query accepted by `POST /search`: free text, or a packed fingerprint as a byte array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QueryBody {
    Text(String),
    Fingerprint(Vec<u8>),
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: QueryBody,
    /// Number of results; server default when absent, clamped to the configured maximum.
    #[serde(default)]
    pub k: Option<usize>,
}

/// Embed the query, search, and hydrate each hit with its metadata.
///
/// Hits without a metadata row are kept with placeholder fields.
pub async fn search(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> ServerResult<Json<Vec<HydratedRecord>>> {
    let Json(req) =
        body.map_err(|e| ServerError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;

    let query = match req.query {
        QueryBody::Text(text) => RetrievalQuery::Text(text),
        QueryBody::Fingerprint(bytes) => {
            RetrievalQuery::Fingerprint(BinaryFingerprint::from_bytes(bytes))
        }
    };
    let cfg = state.retriever.config();
    let k = req.k.unwrap_or(cfg.default_k);

    let started = Instant::now();
    let result = state.retriever.retrieve(query, k, cfg.timeout).await;
    state
        .counters
        .record_search(result.is_ok(), started.elapsed());

    Ok(Json(result?))
}
