use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::SemanticError;

/// Default truncation width for the dense embedding.
pub const DEFAULT_MATRYOSHKA_DIM: usize = 512;
/// Hidden size of nomic-embed-text-v1.5, the model the defaults target.
pub const DEFAULT_HIDDEN_SIZE: usize = 768;
/// Floor applied to the attention-mask sum during mean pooling.
pub const DEFAULT_MASK_CLAMP_MIN: f32 = 1e-9;
/// Epsilon used by layer normalization (matches the conventional 1e-5).
pub const DEFAULT_LAYER_NORM_EPS: f32 = 1e-5;

/// Which [`TokenEncoder`](crate::TokenEncoder) implementation backs the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderMode {
    /// Deterministic hash-seeded token vectors. No model files required.
    #[default]
    Stub,
    /// Local ONNX inference through `ort` + `tokenizers` (requires the `onnx` feature).
    Onnx,
}

/// Runtime configuration describing which encoder to use and how to post-process its output.
///
/// # Example
/// ```
/// use semantic::{EncoderMode, SemanticConfig};
///
/// let cfg = SemanticConfig {
///     mode: EncoderMode::Stub,
///     matryoshka_dim: 256,
///     ..Default::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SemanticConfig {
    /// Encoder backend.
    pub mode: EncoderMode,
    /// Friendly label surfaced in logs and health output.
    pub model_name: String,
    /// Local path of the ONNX export.
    pub model_path: PathBuf,
    /// Path to `tokenizer.json`.
    pub tokenizer_path: PathBuf,
    /// Hidden size `H` of the per-token vectors. The ONNX encoder checks it against the model output.
    pub hidden_size: usize,
    /// Truncation width `D` (first `D` dimensions are kept after layer norm).
    pub matryoshka_dim: usize,
    /// Epsilon added to the variance during layer normalization.
    pub layer_norm_eps: f32,
    /// Minimum denominator for the attention-weighted mean.
    pub mask_clamp_min: f32,
    /// Token budget per text; longer inputs are truncated by the encoder.
    pub max_sequence_length: usize,
    /// Optional task prefix prepended to every text before encoding (e.g. `"search_query: "`).
    pub query_prefix: Option<String>,
    /// Compute device hint (`"cpu"` or `"cuda"`). Only CPU is wired today.
    pub device: String,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            mode: EncoderMode::Stub,
            model_name: "nomic-embed-text-v1.5".into(),
            model_path: PathBuf::from("./models/nomic-embed-text-v1.5/onnx/model.onnx"),
            tokenizer_path: PathBuf::from("./models/nomic-embed-text-v1.5/tokenizer.json"),
            hidden_size: DEFAULT_HIDDEN_SIZE,
            matryoshka_dim: DEFAULT_MATRYOSHKA_DIM,
            layer_norm_eps: DEFAULT_LAYER_NORM_EPS,
            mask_clamp_min: DEFAULT_MASK_CLAMP_MIN,
            max_sequence_length: 8192,
            query_prefix: None,
            device: "cpu".into(),
        }
    }
}

impl SemanticConfig {
    /// Checks the numeric knobs for internal consistency.
    pub fn validate(&self) -> Result<(), SemanticError> {
        if self.hidden_size == 0 {
            return Err(SemanticError::InvalidConfig(
                "hidden_size must be greater than zero".into(),
            ));
        }
        if self.matryoshka_dim == 0 {
            return Err(SemanticError::InvalidConfig(
                "matryoshka_dim must be greater than zero".into(),
            ));
        }
        if self.matryoshka_dim > self.hidden_size {
            return Err(SemanticError::InvalidConfig(format!(
                "matryoshka_dim {} exceeds hidden_size {}",
                self.matryoshka_dim, self.hidden_size
            )));
        }
        if !(self.layer_norm_eps > 0.0) {
            return Err(SemanticError::InvalidConfig(
                "layer_norm_eps must be positive".into(),
            ));
        }
        if !(self.mask_clamp_min > 0.0) {
            return Err(SemanticError::InvalidConfig(
                "mask_clamp_min must be positive".into(),
            ));
        }
        if self.max_sequence_length < 3 {
            return Err(SemanticError::InvalidConfig(
                "max_sequence_length must leave room for special tokens".into(),
            ));
        }
        Ok(())
    }
}
