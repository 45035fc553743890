//! YAML configuration file support for binfp.
//!
//! One document configures every stage: the encoder and post-processing knobs, the
//! quantizer, the default output mode and the retrieval collaborators.
//!
//! ## Example YAML configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "pubmed"
//!
//! semantic:
//!   mode: "onnx"
//!   model_name: "nomic-embed-text-v1.5"
//!   model_path: "./models/nomic-embed-text-v1.5/onnx/model.onnx"
//!   tokenizer_path: "./models/nomic-embed-text-v1.5/tokenizer.json"
//!   hidden_size: 768
//!   matryoshka_dim: 512
//!
//! quantize:
//!   use_parallel: false
//!
//! output:
//!   only_binary: true
//!
//! retrieval:
//!   search_url: "http://localhost:8003"
//!   query_mode: "fingerprint"
//!   timeout_ms: 10000
//!   default_k: 20
//!   max_k: 100
//!   metadata:
//!     backend: "sqlite"
//!     path: "./data/pubmed.db"
//!     table: "articles"
//! ```

use std::fs;
use std::path::Path;

use quantize::QuantizeConfig;
use semantic::SemanticConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Configuration format version
    #[serde(default = "default_config_version")]
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(default)]
    pub quantize: QuantizeConfig,

    #[serde(default)]
    pub output: OutputYamlConfig,

    #[serde(default)]
    pub retrieval: RetrievalYamlConfig,
}

impl PipelineConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.semantic
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("semantic: {e}")))?;
        self.quantize
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("quantize: {e}")))?;
        if let Some(dim) = self.quantize.expected_dim
            && dim != self.semantic.matryoshka_dim
        {
            return Err(ConfigLoadError::Validation(format!(
                "quantize.expected_dim {dim} differs from semantic.matryoshka_dim {}",
                self.semantic.matryoshka_dim
            )));
        }
        self.retrieval.validate()?;
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            name: None,
            semantic: SemanticConfig::default(),
            quantize: QuantizeConfig::default(),
            output: OutputYamlConfig::default(),
            retrieval: RetrievalYamlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputYamlConfig {
    /// Default for requests that do not say whether they want the dense vector.
    #[serde(default = "true_value")]
    pub only_binary: bool,
}

impl Default for OutputYamlConfig {
    fn default() -> Self {
        Self { only_binary: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalYamlConfig {
    /// Base URL of the search service (`/find_matches` is appended).
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Remote embedding endpoint. When unset, queries are embedded in-process.
    #[serde(default)]
    pub embed_url: Option<String>,

    /// `"fingerprint"` sends the binary code, `"text"` forwards the raw query text.
    #[serde(default = "default_query_mode")]
    pub query_mode: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_k")]
    pub default_k: usize,

    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Retries for the search call. Zero disables retrying.
    #[serde(default)]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default)]
    pub metadata: MetadataYamlConfig,
}

impl RetrievalYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.search_url.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "retrieval.search_url must not be empty".to_string(),
            ));
        }
        let valid_modes = ["fingerprint", "text"];
        if !valid_modes.contains(&self.query_mode.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "retrieval.query_mode must be one of: {valid_modes:?}"
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "retrieval.timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.max_k == 0 {
            return Err(ConfigLoadError::Validation(
                "retrieval.max_k must be >= 1".to_string(),
            ));
        }
        if self.default_k == 0 || self.default_k > self.max_k {
            return Err(ConfigLoadError::Validation(format!(
                "retrieval.default_k must be between 1 and max_k ({})",
                self.max_k
            )));
        }
        self.metadata.validate()
    }
}

impl Default for RetrievalYamlConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            embed_url: None,
            query_mode: default_query_mode(),
            timeout_ms: default_timeout_ms(),
            default_k: default_k(),
            max_k: default_max_k(),
            retry_max_attempts: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            metadata: MetadataYamlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataYamlConfig {
    /// `"in_memory"` or `"sqlite"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database file for the sqlite backend.
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,
}

impl MetadataYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.backend.as_str() {
            "in_memory" => {}
            "sqlite" => {
                if self.path.as_deref().is_none_or(|p| p.trim().is_empty()) {
                    return Err(ConfigLoadError::Validation(
                        "retrieval.metadata.path is required for the sqlite backend".to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigLoadError::Validation(format!(
                    "retrieval.metadata.backend must be one of: [\"in_memory\", \"sqlite\"] (got {other:?})"
                )));
            }
        }
        let valid_table = !self.table.is_empty()
            && self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_table {
            return Err(ConfigLoadError::Validation(format!(
                "retrieval.metadata.table {:?} is not a plain identifier",
                self.table
            )));
        }
        Ok(())
    }
}

impl Default for MetadataYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            table: default_table(),
        }
    }
}

fn default_config_version() -> String {
    "1.0".to_string()
}
fn true_value() -> bool {
    true
}
fn default_search_url() -> String {
    "http://localhost:8003".to_string()
}
fn default_query_mode() -> String {
    "fingerprint".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_k() -> usize {
    20
}
fn default_max_k() -> usize {
    100
}
fn default_retry_base_delay_ms() -> u64 {
    100
}
fn default_backend() -> String {
    "in_memory".to_string()
}
fn default_table() -> String {
    "articles".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
semantic:
  matryoshka_dim: 256
output:
  only_binary: false
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.semantic.matryoshka_dim, 256);
        assert_eq!(config.semantic.hidden_size, 768);
        assert!(!config.output.only_binary);
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1.0"
retrieval:
  search_url: "http://search:8003"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = PipelineConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.retrieval.search_url, "http://search:8003");
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.name.is_none());
        assert!(config.output.only_binary);
        assert_eq!(config.retrieval.default_k, 20);
        assert_eq!(config.retrieval.max_k, 100);
        assert_eq!(config.retrieval.retry_max_attempts, 0);
        assert_eq!(config.retrieval.metadata.backend, "in_memory");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_version() {
        let result = PipelineConfig::from_yaml("version: \"2.0\"\n");
        assert!(matches!(
            result,
            Err(ConfigLoadError::UnsupportedVersion(v)) if v == "2.0"
        ));
    }

    #[test]
    fn test_semantic_validation() {
        let yaml = r#"
version: "1.0"
semantic:
  hidden_size: 384
  matryoshka_dim: 512
"#;

        let result = PipelineConfig::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("matryoshka_dim"));
    }

    #[test]
    fn test_expected_dim_must_match() {
        let yaml = r#"
version: "1.0"
quantize:
  expected_dim: 256
"#;

        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("expected_dim 256"));
    }

    #[test]
    fn test_retrieval_validation() {
        let yaml = r#"
version: "1.0"
retrieval:
  query_mode: "vector"
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("query_mode"));

        let yaml = r#"
version: "1.0"
retrieval:
  default_k: 200
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("default_k"));
    }

    #[test]
    fn test_sqlite_requires_path() {
        let yaml = r#"
version: "1.0"
retrieval:
  metadata:
    backend: "sqlite"
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("path is required"));
    }

    #[test]
    fn test_table_must_be_identifier() {
        let yaml = r#"
version: "1.0"
retrieval:
  metadata:
    table: "articles; DROP TABLE x"
"#;
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_full_yaml_roundtrip() {
        let yaml = r#"
version: "1.0"
name: "production"
semantic:
  mode: "stub"
  model_name: "nomic-embed-text-v1.5"
  hidden_size: 768
  matryoshka_dim: 512
  query_prefix: "search_query: "
  device: "cpu"

quantize:
  expected_dim: 512
  use_parallel: true

output:
  only_binary: true

retrieval:
  search_url: "http://0.0.0.0:8003"
  embed_url: "http://localhost:8002"
  query_mode: "text"
  timeout_ms: 5000
  default_k: 5
  max_k: 100
  retry_max_attempts: 2
  metadata:
    backend: "sqlite"
    path: "/var/lib/binfp/pubmed.db"
    table: "pubmed_articles"
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.semantic.query_prefix.as_deref(), Some("search_query: "));
        assert_eq!(config.quantize.expected_dim, Some(512));
        assert!(config.quantize.use_parallel);
        assert_eq!(config.retrieval.embed_url.as_deref(), Some("http://localhost:8002"));
        assert_eq!(config.retrieval.query_mode, "text");
        assert_eq!(config.retrieval.default_k, 5);
        assert_eq!(config.retrieval.retry_max_attempts, 2);
        assert_eq!(config.retrieval.metadata.table, "pubmed_articles");

        let serialized = serde_yaml::to_string(&config).unwrap();
        let reparsed = PipelineConfig::from_yaml(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }
}
