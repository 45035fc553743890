use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use binfp::{BinaryFingerprint, DenseEmbedding, OutputMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `POST /embed`. Exactly one of `text` or `texts` must be present.
#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub texts: Option<Vec<String>>,

    /// Omit the dense vector from the response. Server default when absent.
    #[serde(default)]
    pub only_binary: Option<bool>,
}

/// Batch response: one row per input text, in input order.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchEmbedResponse {
    pub binary_embedding: Vec<BinaryFingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<DenseEmbedding>>,
}

/// Embed one text or a batch.
///
/// ```json
/// // Request
/// { "text": "What are the biologies of TEAD?", "only_binary": true }
///
/// // Response
/// { "binary_embedding": [178, 224, ...] }
/// ```
///
/// A `texts` request answers with arrays of rows. Every failure, including a malformed
/// body, is a 500 with a `detail` message.
pub async fn embed(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<EmbedRequest>, JsonRejection>,
) -> ServerResult<Response> {
    let result = embed_inner(&state, body).await;
    state.counters.record_embed(result.is_ok());
    result
}

async fn embed_inner(
    state: &Arc<ServerState>,
    body: Result<Json<EmbedRequest>, JsonRejection>,
) -> ServerResult<Response> {
    let Json(req) = body.map_err(|e| ServerError::Embedding(e.body_text()))?;
    let mode = req
        .only_binary
        .map(OutputMode::from_only_binary)
        .unwrap_or(state.default_mode);

    match (req.text, req.texts) {
        (Some(text), None) => {
            let out = state.pipeline.embed_async(text, mode).await?;
            Ok(Json(out).into_response())
        }
        (None, Some(texts)) => {
            let outputs = state.pipeline.embed_batch_async(texts, mode).await?;
            let mut fingerprints = Vec::with_capacity(outputs.len());
            let mut dense = Vec::with_capacity(outputs.len());
            for out in outputs {
                fingerprints.push(out.fingerprint);
                dense.extend(out.dense);
            }
            let body = BatchEmbedResponse {
                binary_embedding: fingerprints,
                embedding: mode.includes_dense().then_some(dense),
            };
            Ok(Json(body).into_response())
        }
        (Some(_), Some(_)) => Err(ServerError::Embedding(
            "provide either `text` or `texts`, not both".into(),
        )),
        (None, None) => Err(ServerError::Embedding(
            "request must contain `text` or `texts`".into(),
        )),
    }
}
