use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use binfp::PipelineError;
use retrieval::{RetrievalError, UpstreamError};
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    /// Any failure while producing embeddings. Always reported as a 500.
    #[error("{0}")]
    Embedding(String),

    #[error("{0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Embedding(_) | ServerError::Internal(_) | ServerError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Retrieval(err) => match err {
                RetrievalError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                RetrievalError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
                RetrievalError::Embedding(UpstreamError::Local(_))
                | RetrievalError::MetadataLookup(UpstreamError::Local(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::Embedding(_) => "EMBEDDING_FAILED",
            ServerError::Retrieval(err) => match err {
                RetrievalError::Embedding(_) => "EMBEDDING_FAILED",
                RetrievalError::SearchService(_) => "SEARCH_SERVICE_ERROR",
                RetrievalError::MetadataLookup(_) => "METADATA_LOOKUP_ERROR",
                RetrievalError::InvalidRequest(_) => "BAD_REQUEST",
                RetrievalError::InvalidConfig(_) => "CONFIG_ERROR",
            },
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl From<PipelineError> for ServerError {
    fn from(err: PipelineError) -> Self {
        ServerError::Embedding(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        }
        let stage = match &self {
            ServerError::Retrieval(err) => Some(err.stage().to_string()),
            _ => None,
        };
        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.error_code().to_string(),
            stage,
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retrieval_errors_map_to_gateway_statuses() {
        let cases = [
            (
                RetrievalError::SearchService(UpstreamError::Unreachable("refused".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                RetrievalError::SearchService(UpstreamError::TimedOut(Duration::from_secs(1))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                RetrievalError::MetadataLookup(UpstreamError::TimedOut(Duration::from_secs(1))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                RetrievalError::InvalidRequest("k".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RetrievalError::Embedding(UpstreamError::Local("worker".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::Retrieval(err).status_code(), status);
        }
    }

    #[test]
    fn pipeline_errors_are_500() {
        let err: ServerError = PipelineError::EmptyText { index: 0 }.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "text at index 0 is empty");
    }
}
