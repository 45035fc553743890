use std::sync::Arc;

use tracing::info;

use crate::stub::StubEncoder;
use crate::{EncoderMode, RawTokenOutput, SemanticConfig, SemanticError};

/// A model that maps a batch of texts to per-token vectors plus the matching attention mask.
///
/// Implementations pad the batch to a common token count and mark padding with mask 0.
/// They are shared across threads behind an `Arc`, so any interior state (an inference
/// session, for example) must be synchronized by the implementation.
pub trait TokenEncoder: Send + Sync {
    /// Label used in logs and health output.
    fn name(&self) -> &str;

    /// Width `H` of each token vector.
    fn hidden_size(&self) -> usize;

    /// Encodes `texts` into a `[batch, tokens, hidden]` output. The batch order matches `texts`.
    fn encode(&self, texts: &[&str]) -> Result<RawTokenOutput, SemanticError>;
}

/// Builds the encoder selected by `cfg.mode`.
///
/// ONNX mode needs the `onnx` feature; without it the call fails with
/// [`SemanticError::InvalidConfig`] rather than silently falling back to the stub.
pub fn load_encoder(cfg: &SemanticConfig) -> Result<Arc<dyn TokenEncoder>, SemanticError> {
    cfg.validate()?;
    match cfg.mode {
        EncoderMode::Stub => {
            info!(
                model = %cfg.model_name,
                hidden_size = cfg.hidden_size,
                "using deterministic stub encoder"
            );
            Ok(Arc::new(StubEncoder::from_config(cfg)))
        }
        EncoderMode::Onnx => load_onnx(cfg),
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(cfg: &SemanticConfig) -> Result<Arc<dyn TokenEncoder>, SemanticError> {
    let encoder = crate::onnx::OnnxEncoder::load(cfg)?;
    Ok(Arc::new(encoder))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_cfg: &SemanticConfig) -> Result<Arc<dyn TokenEncoder>, SemanticError> {
    Err(SemanticError::InvalidConfig(
        "onnx mode requires building with the `onnx` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_stub_encoder() {
        let cfg = SemanticConfig::default();
        let encoder = load_encoder(&cfg).unwrap();
        assert_eq!(encoder.hidden_size(), 768);
        assert_eq!(encoder.name(), "nomic-embed-text-v1.5");
    }

    #[test]
    fn load_rejects_invalid_config() {
        let cfg = SemanticConfig {
            matryoshka_dim: 1024,
            ..Default::default()
        };
        assert!(matches!(
            load_encoder(&cfg),
            Err(SemanticError::InvalidConfig(_))
        ));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn onnx_mode_requires_feature() {
        let cfg = SemanticConfig {
            mode: EncoderMode::Onnx,
            ..Default::default()
        };
        let err = load_encoder(&cfg).err().unwrap();
        assert!(err.to_string().contains("onnx"));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn onnx_mode_reports_missing_model() {
        let cfg = SemanticConfig {
            mode: EncoderMode::Onnx,
            model_path: "/nonexistent/model.onnx".into(),
            ..Default::default()
        };
        assert!(matches!(
            load_encoder(&cfg),
            Err(SemanticError::ModelNotFound(_))
        ));
    }
}
