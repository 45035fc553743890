use std::path::PathBuf;
use std::time::Duration;

use binfp::{RetrievalYamlConfig, fingerprint_len};
use serde::{Deserialize, Serialize};

use crate::RetrievalError;
use crate::retry::RetryConfig;

/// Embedding width the default fingerprint length is derived from.
const DEFAULT_FINGERPRINT_DIM: usize = 512;

/// How a text query reaches the search service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Embed the text and send the packed fingerprint.
    #[default]
    Fingerprint,
    /// Forward the raw text; the search service embeds it itself.
    Text,
}

/// Which metadata store backs hydration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum MetadataConfig {
    #[default]
    InMemory,
    Sqlite { path: PathBuf, table: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Base URL of the search service.
    pub search_url: String,
    /// Remote `/embed` endpoint; `None` embeds in-process.
    pub embed_url: Option<String>,
    pub query_mode: QueryMode,
    /// Default bound on each network or database call.
    #[serde(with = "crate::serde_millis")]
    pub timeout: Duration,
    pub default_k: usize,
    pub max_k: usize,
    /// Backoff policy for the search call. `None` means a single attempt.
    pub retry: Option<RetryConfig>,
    pub metadata: MetadataConfig,
    /// Byte length every fingerprint query must have: `ceil(D / 8)` for the deployed model.
    pub expected_fingerprint_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_url: "http://localhost:8003".into(),
            embed_url: None,
            query_mode: QueryMode::Fingerprint,
            timeout: Duration::from_secs(10),
            default_k: 20,
            max_k: 100,
            retry: None,
            metadata: MetadataConfig::InMemory,
            expected_fingerprint_len: fingerprint_len(DEFAULT_FINGERPRINT_DIM),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.search_url.trim().is_empty() {
            return Err(RetrievalError::InvalidConfig(
                "search_url must not be empty".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(RetrievalError::InvalidConfig(
                "timeout must be greater than zero".into(),
            ));
        }
        if self.max_k == 0 || self.default_k == 0 || self.default_k > self.max_k {
            return Err(RetrievalError::InvalidConfig(format!(
                "need 1 <= default_k ({}) <= max_k ({})",
                self.default_k, self.max_k
            )));
        }
        if self.expected_fingerprint_len == 0 {
            return Err(RetrievalError::InvalidConfig(
                "expected_fingerprint_len must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Endpoint the search client posts to.
    pub fn find_matches_url(&self) -> String {
        format!("{}/find_matches", self.search_url.trim_end_matches('/'))
    }
}

impl TryFrom<&RetrievalYamlConfig> for RetrievalConfig {
    type Error = RetrievalError;

    fn try_from(yaml: &RetrievalYamlConfig) -> Result<Self, Self::Error> {
        let query_mode = match yaml.query_mode.as_str() {
            "fingerprint" => QueryMode::Fingerprint,
            "text" => QueryMode::Text,
            other => {
                return Err(RetrievalError::InvalidConfig(format!(
                    "unknown query_mode {other:?}"
                )));
            }
        };
        let metadata = match yaml.metadata.backend.as_str() {
            "in_memory" => MetadataConfig::InMemory,
            "sqlite" => {
                let path = yaml.metadata.path.as_deref().ok_or_else(|| {
                    RetrievalError::InvalidConfig("sqlite backend requires a path".into())
                })?;
                MetadataConfig::Sqlite {
                    path: PathBuf::from(path),
                    table: yaml.metadata.table.clone(),
                }
            }
            other => {
                return Err(RetrievalError::InvalidConfig(format!(
                    "unknown metadata backend {other:?}"
                )));
            }
        };
        let retry = (yaml.retry_max_attempts > 0).then(|| {
            RetryConfig::default()
                .with_max_retries(yaml.retry_max_attempts)
                .with_base_delay(Duration::from_millis(yaml.retry_base_delay_ms))
        });

        let cfg = Self {
            search_url: yaml.search_url.clone(),
            embed_url: yaml.embed_url.clone(),
            query_mode,
            timeout: Duration::from_millis(yaml.timeout_ms),
            default_k: yaml.default_k,
            max_k: yaml.max_k,
            retry,
            metadata,
            ..Default::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
