//! Client for the external vector-search service.
//!
//! The service exposes `POST /find_matches` taking `{"query": ..., "k": ...}`, where `query`
//! is either the packed fingerprint as an integer array or plain text, and answers with a
//! JSON array of `{id | pmid, distance}` objects ordered best match first. Text-mode
//! services may add `title`, `authors`, `abstract` and `publication_year` to each hit.

use std::time::Duration;

use async_trait::async_trait;
use binfp::BinaryFingerprint;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::UpstreamError;
use crate::types::MatchResult;

/// Query payload sent to the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchQuery {
    Fingerprint(BinaryFingerprint),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub query: SearchQuery,
    pub k: usize,
}

/// Nearest-neighbour search over stored fingerprints.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn find_matches(
        &self,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<MatchResult>, UpstreamError>;
}

/// [`SearchClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSearchClient {
    /// `endpoint` is the full `/find_matches` URL.
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn find_matches(
        &self,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<MatchResult>, UpstreamError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, timeout))?;
        let matches = parse_matches(body)?;
        debug!(k = request.k, returned = matches.len(), "search service answered");
        Ok(matches)
    }
}

fn parse_matches(body: Value) -> Result<Vec<MatchResult>, UpstreamError> {
    let Value::Array(items) = body else {
        return Err(UpstreamError::Malformed(
            "expected a JSON array of matches".into(),
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| UpstreamError::Malformed(format!("match {i}: {e}")))
        })
        .collect()
}
