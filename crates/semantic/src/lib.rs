//! binfp semantic embeddings
//!
//! This crate turns text into dense, L2-normalized sentence embeddings. An encoder
//! produces per-token vectors plus an attention mask; the post-processor then reduces
//! them to one vector per text:
//!
//! 1. **Mean pooling** weighted by the attention mask (padding is ignored).
//! 2. **Layer normalization** across the full hidden width, no learned affine.
//! 3. **Matryoshka truncation** to the first `D` dimensions (512 by default).
//! 4. **L2 normalization** so every non-zero embedding has unit length.
//!
//! The output is bit-for-bit deterministic for identical encoder output, which is what
//! lets the downstream binary fingerprints be compared across processes.
//!
//! Two encoders ship:
//!
//! - **Stub** - deterministic hash-seeded token vectors. No model files, used in tests.
//! - **ONNX** - local inference via `ort` + `tokenizers`, behind the `onnx` feature.
//!
//! ## Quick example
//!
//! ```
//! use semantic::{load_encoder, semanticize, PostProcessor, SemanticConfig};
//!
//! let cfg = SemanticConfig::default();
//! let encoder = load_encoder(&cfg).unwrap();
//! let processor = PostProcessor::from_config(&cfg).unwrap();
//!
//! let out = semanticize(encoder.as_ref(), &processor, &["binary fingerprints"]).unwrap();
//! assert_eq!(out[0].dim(), 512);
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod normalize;
pub mod pool;
pub mod postprocess;
pub mod types;

#[cfg(feature = "onnx")]
mod onnx;
mod stub;

pub use crate::config::{EncoderMode, SemanticConfig};
pub use crate::encoder::{load_encoder, TokenEncoder};
pub use crate::error::SemanticError;
pub use crate::postprocess::PostProcessor;
pub use crate::stub::StubEncoder;
pub use crate::types::{DenseEmbedding, RawTokenOutput};

#[cfg(feature = "onnx")]
pub use crate::onnx::OnnxEncoder;

use tracing::debug;

/// Encodes `texts` and post-processes the token output into one embedding per text.
///
/// Empty or whitespace-only texts are rejected with [`SemanticError::Input`]; the encoder
/// is never called for a batch containing one.
pub fn semanticize(
    encoder: &dyn TokenEncoder,
    processor: &PostProcessor,
    texts: &[&str],
) -> Result<Vec<DenseEmbedding>, SemanticError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(idx) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(SemanticError::Input(format!("text at index {idx} is empty")));
    }

    let raw = encoder.encode(texts)?;
    if raw.batch_size() != texts.len() {
        return Err(SemanticError::Inference(format!(
            "encoder returned {} rows for {} texts",
            raw.batch_size(),
            texts.len()
        )));
    }
    debug!(
        encoder = encoder.name(),
        batch = raw.batch_size(),
        tokens = raw.tokens(),
        "encoded batch"
    );
    processor.process(&raw)
}
