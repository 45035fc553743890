//! Configuration and error types for binary quantization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Knobs for the quantization stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuantizeConfig {
    /// Expected embedding width. When set, every input must match it exactly.
    pub expected_dim: Option<usize>,
    /// Quantize batch rows on the rayon pool.
    pub use_parallel: bool,
    /// Minimum batch size before the parallel path is taken.
    pub parallel_threshold: usize,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            expected_dim: None,
            use_parallel: false,
            parallel_threshold: 64,
        }
    }
}

impl QuantizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected_dim(mut self, dim: usize) -> Self {
        self.expected_dim = Some(dim);
        self
    }

    /// Enable or disable parallel batch quantization.
    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    pub fn validate(&self) -> Result<(), QuantizeError> {
        if self.expected_dim == Some(0) {
            return Err(QuantizeError::EmptyEmbedding);
        }
        Ok(())
    }
}

/// Errors returned by the quantizer. Both are caller faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("cannot quantize an empty embedding")]
    EmptyEmbedding,

    #[error("embedding {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let cfg = QuantizeConfig::default();
        assert_eq!(cfg.expected_dim, None);
        assert!(!cfg.use_parallel);
        assert_eq!(cfg.parallel_threshold, 64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_builders() {
        let cfg = QuantizeConfig::new().with_expected_dim(512).with_parallel(true);
        assert_eq!(cfg.expected_dim, Some(512));
        assert!(cfg.use_parallel);
    }

    #[test]
    fn config_rejects_zero_expected_dim() {
        let cfg = QuantizeConfig::new().with_expected_dim(0);
        assert_eq!(cfg.validate(), Err(QuantizeError::EmptyEmbedding));
    }

    #[test]
    fn error_messages_name_dimensions() {
        let err = QuantizeError::DimensionMismatch {
            index: 2,
            expected: 512,
            actual: 384,
        };
        let msg = err.to_string();
        assert!(msg.contains("embedding 2"));
        assert!(msg.contains("384"));
        assert!(msg.contains("512"));
    }
}
