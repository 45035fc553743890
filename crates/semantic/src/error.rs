use std::io;
use thiserror::Error;

/// Errors surfaced while encoding text and post-processing token outputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    /// Malformed caller input: empty text, mask/vector shape mismatch, non-binary mask values.
    #[error("invalid input: {0}")]
    Input(String),
    /// The ONNX model could not be located on disk.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// The tokenizer JSON is missing.
    #[error("tokenizer missing: {0}")]
    TokenizerMissing(String),
    /// Configuration is inconsistent (e.g., truncation width larger than the hidden size).
    #[error("invalid semantic config: {0}")]
    InvalidConfig(String),
    /// Filesystem failure, kept as its message so the error stays `Clone`.
    #[error("io error: {0}")]
    Io(String),
    /// ONNX Runtime or tokenizer failures.
    #[error("inference failure: {0}")]
    Inference(String),
}

impl SemanticError {
    /// Whether the failure is the caller's fault and must not be retried.
    pub fn is_input_error(&self) -> bool {
        matches!(self, SemanticError::Input(_))
    }
}

impl From<io::Error> for SemanticError {
    fn from(err: io::Error) -> Self {
        SemanticError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_input() {
        let err = SemanticError::Input("attention mask has 3 tokens, vectors have 4".into());
        assert!(err.to_string().contains("invalid input"));
        assert!(err.to_string().contains("attention mask"));
        assert!(err.is_input_error());
    }

    #[test]
    fn error_model_not_found() {
        let err = SemanticError::ModelNotFound("/path/to/model.onnx".into());
        assert!(err.to_string().contains("model file not found"));
        assert!(err.to_string().contains("/path/to/model.onnx"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn error_invalid_config() {
        let err = SemanticError::InvalidConfig("matryoshka_dim 1024 exceeds hidden size 768".into());
        assert!(err.to_string().contains("invalid semantic config"));
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn error_inference() {
        let err = SemanticError::Inference("ONNX session failed".into());
        assert!(err.to_string().contains("inference failure"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: SemanticError = io_err.into();
        assert!(err.to_string().contains("io error"));
    }

    #[test]
    fn error_io_keeps_message_through_clone() {
        let err: SemanticError = io::Error::other("disk gone").into();
        assert_eq!(err.clone(), SemanticError::Io("disk gone".into()));
    }

    #[test]
    fn error_clone_preserves_message() {
        let err = SemanticError::Input("empty text".into());
        assert_eq!(err.to_string(), err.clone().to_string());
    }
}
