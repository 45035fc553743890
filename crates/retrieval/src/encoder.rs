//! Turning query text into a fingerprint, in-process or through a remote `/embed` endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use binfp::{BinaryFingerprint, OutputMode, Pipeline};
use serde_json::{Value, json};

use crate::error::{RetrievalError, UpstreamError};

/// Produces the fingerprint for a query text.
#[async_trait]
pub trait QueryEncoder: Send + Sync {
    async fn encode(&self, text: &str, timeout: Duration)
    -> Result<BinaryFingerprint, RetrievalError>;
}

/// Runs the embedding pipeline in this process.
#[derive(Debug, Clone)]
pub struct LocalQueryEncoder {
    pipeline: Arc<Pipeline>,
}

impl LocalQueryEncoder {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl QueryEncoder for LocalQueryEncoder {
    async fn encode(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<BinaryFingerprint, RetrievalError> {
        let work = self
            .pipeline
            .embed_async(text.to_string(), OutputMode::BinaryOnly);
        match tokio::time::timeout(timeout, work).await {
            Err(_) => Err(RetrievalError::Embedding(UpstreamError::TimedOut(timeout))),
            Ok(Ok(out)) => Ok(out.fingerprint),
            Ok(Err(err)) if err.is_input_error() => {
                Err(RetrievalError::InvalidRequest(err.to_string()))
            }
            Ok(Err(err)) => Err(RetrievalError::Embedding(UpstreamError::Local(
                err.to_string(),
            ))),
        }
    }
}

/// Calls an embedding service speaking the `/embed` protocol.
#[derive(Debug, Clone)]
pub struct RemoteQueryEncoder {
    client: reqwest::Client,
    url: String,
}

impl RemoteQueryEncoder {
    /// `url` is the full endpoint, e.g. `http://localhost:8002/embed`.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl QueryEncoder for RemoteQueryEncoder {
    async fn encode(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<BinaryFingerprint, RetrievalError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&json!({ "text": text, "only_binary": true }))
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding(UpstreamError::from_reqwest(e, timeout)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(UpstreamError::Status {
                status: status.as_u16(),
                message,
            }));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(UpstreamError::from_reqwest(e, timeout)))?;
        parse_binary_embedding(body)
            .map(BinaryFingerprint::from_bytes)
            .map_err(|msg| RetrievalError::Embedding(UpstreamError::Malformed(msg)))
    }
}

/// Accepts `binary_embedding` as a flat byte array or as a one-row batch (`[[...]]`).
fn parse_binary_embedding(body: Value) -> Result<Vec<u8>, String> {
    let field = match body {
        Value::Object(mut map) => map
            .remove("binary_embedding")
            .ok_or_else(|| "response has no binary_embedding field".to_string())?,
        _ => return Err("expected a JSON object".into()),
    };
    let row = match field {
        Value::Array(mut items) if matches!(items.first(), Some(Value::Array(_))) => {
            items.swap_remove(0)
        }
        other => other,
    };
    serde_json::from_value(row).map_err(|e| format!("binary_embedding: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use binfp::PipelineConfig;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_flat_and_nested_embeddings() {
        assert_eq!(
            parse_binary_embedding(json!({"binary_embedding": [1, 2, 255]})).unwrap(),
            vec![1, 2, 255]
        );
        assert_eq!(
            parse_binary_embedding(json!({"binary_embedding": [[7, 8]]})).unwrap(),
            vec![7, 8]
        );
        assert!(parse_binary_embedding(json!({"embedding": [0.1]})).is_err());
        assert!(parse_binary_embedding(json!({"binary_embedding": [300]})).is_err());
    }

    #[tokio::test]
    async fn remote_encoder_requests_binary_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .and(body_json(json!({"text": "TEAD", "only_binary": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"binary_embedding": [[178, 224]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let encoder = RemoteQueryEncoder::new(reqwest::Client::new(), format!("{}/embed", server.uri()));
        let fp = encoder.encode("TEAD", Duration::from_secs(5)).await.unwrap();
        assert_eq!(fp.as_bytes(), &[178, 224]);
    }

    #[tokio::test]
    async fn remote_encoder_failure_is_an_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "cuda oom"})))
            .mount(&server)
            .await;

        let encoder = RemoteQueryEncoder::new(reqwest::Client::new(), format!("{}/embed", server.uri()));
        let err = encoder.encode("TEAD", Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.stage(), "embedding");
        assert!(err.to_string().contains("cuda oom"));
    }

    #[tokio::test]
    async fn local_encoder_matches_pipeline() {
        let pipeline = Arc::new(Pipeline::from_config(&PipelineConfig::default()).unwrap());
        let expected = pipeline.fingerprint("hello world").unwrap();

        let encoder = LocalQueryEncoder::new(Arc::clone(&pipeline));
        let fp = encoder.encode("hello world", Duration::from_secs(5)).await.unwrap();
        assert_eq!(fp, expected);
    }

    #[tokio::test]
    async fn local_encoder_rejects_blank_text() {
        let pipeline = Arc::new(Pipeline::from_config(&PipelineConfig::default()).unwrap());
        let err = LocalQueryEncoder::new(pipeline)
            .encode("  ", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidRequest(_)));
    }
}
