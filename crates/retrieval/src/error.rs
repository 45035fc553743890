use std::time::Duration;

use thiserror::Error;

/// Failure talking to one collaborator (search service, embedding endpoint or metadata store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, closed socket and similar transport faults.
    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The collaborator answered with a non-success status.
    #[error("returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The collaborator answered but the body could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// In-process failure (local pipeline or database driver).
    #[error("{0}")]
    Local(String),
}

impl UpstreamError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            UpstreamError::TimedOut(timeout)
        } else if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            UpstreamError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            UpstreamError::Unreachable(err.to_string())
        }
    }

    /// Transport faults, timeouts, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Unreachable(_) | UpstreamError::TimedOut(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::Malformed(_) | UpstreamError::Local(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::TimedOut(_))
    }
}

/// One error per orchestration stage, so callers can tell which hop failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(UpstreamError),

    #[error("search service {0}")]
    SearchService(UpstreamError),

    #[error("metadata lookup failed: {0}")]
    MetadataLookup(UpstreamError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid retrieval config: {0}")]
    InvalidConfig(String),
}

impl RetrievalError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            RetrievalError::Embedding(_) => "embedding",
            RetrievalError::SearchService(_) => "search",
            RetrievalError::MetadataLookup(_) => "metadata",
            RetrievalError::InvalidRequest(_) => "request",
            RetrievalError::InvalidConfig(_) => "config",
        }
    }

    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            RetrievalError::Embedding(e)
            | RetrievalError::SearchService(e)
            | RetrievalError::MetadataLookup(e) => Some(e),
            RetrievalError::InvalidRequest(_) | RetrievalError::InvalidConfig(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.upstream().is_some_and(UpstreamError::is_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_each_hop() {
        let err = RetrievalError::SearchService(UpstreamError::Status {
            status: 503,
            message: "overloaded".into(),
        });
        assert_eq!(err.stage(), "search");
        assert_eq!(
            err.to_string(),
            "search service returned status 503: overloaded"
        );
        assert_eq!(RetrievalError::InvalidRequest("k".into()).stage(), "request");
        assert_eq!(
            RetrievalError::MetadataLookup(UpstreamError::Local("disk".into())).stage(),
            "metadata"
        );
    }

    #[test]
    fn timeouts_are_distinguished() {
        let err = RetrievalError::MetadataLookup(UpstreamError::TimedOut(Duration::from_millis(250)));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "metadata lookup failed: timed out after 250ms");

        let err = RetrievalError::SearchService(UpstreamError::Unreachable("refused".into()));
        assert!(!err.is_timeout());
    }

    #[test]
    fn transient_classification() {
        assert!(UpstreamError::Unreachable("reset".into()).is_transient());
        assert!(UpstreamError::TimedOut(Duration::from_secs(1)).is_transient());
        assert!(
            UpstreamError::Status {
                status: 429,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            UpstreamError::Status {
                status: 502,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !UpstreamError::Status {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!UpstreamError::Malformed("eof".into()).is_transient());
    }
}
