//! # binfp Binary Quantization
//!
//! Converts dense float embeddings into packed sign-bit fingerprints. Each dimension
//! contributes one bit (`1` iff the value is strictly positive), packed eight to a byte
//! most-significant-bit first, the same layout `numpy.packbits` produces. A 512-dimension
//! embedding (2048 bytes of `f32`) becomes a 64-byte code that can be compared with
//! Hamming distance.
//!
//! The stage is pure: no I/O, no clocks, no global state. For identical input the
//! output is bit identical, and batch output order always matches input order, also on
//! the parallel path.
//!
//! ## Example
//!
//! ```
//! use quantize::{quantize, fingerprint_len};
//!
//! let fp = quantize(&[0.5, -0.25, 0.0, 1.0]);
//! assert_eq!(fp.as_bytes(), &[0b1001_0000]);
//! assert_eq!(fp.len_bytes(), fingerprint_len(4));
//! ```

pub mod config;
pub mod fingerprint;
mod pack;

pub use crate::config::{QuantizeConfig, QuantizeError};
pub use crate::fingerprint::BinaryFingerprint;
pub use crate::pack::fingerprint_len;

use rayon::prelude::*;
use semantic::DenseEmbedding;

use crate::pack::pack_sign_bits;

/// Quantizes one vector of any width.
pub fn quantize(values: &[f32]) -> BinaryFingerprint {
    BinaryFingerprint::from_packed(pack_sign_bits(values), values.len())
}

/// Quantizes one vector after checking it against `cfg.expected_dim`.
pub fn quantize_checked(
    values: &[f32],
    cfg: &QuantizeConfig,
) -> Result<BinaryFingerprint, QuantizeError> {
    check_dim(0, values.len(), cfg.expected_dim)?;
    Ok(quantize(values))
}

/// Quantizes a post-processed embedding.
pub fn quantize_embedding(embedding: &DenseEmbedding) -> BinaryFingerprint {
    quantize(embedding.as_slice())
}

/// Quantizes a batch, one fingerprint per embedding, in input order.
///
/// All rows must share a width (the first row's, unless `cfg.expected_dim` pins it).
pub fn quantize_batch(
    embeddings: &[DenseEmbedding],
    cfg: &QuantizeConfig,
) -> Result<Vec<BinaryFingerprint>, QuantizeError> {
    let Some(first) = embeddings.first() else {
        return Ok(Vec::new());
    };
    let expected = cfg.expected_dim.unwrap_or(first.dim());
    for (index, emb) in embeddings.iter().enumerate() {
        check_dim(index, emb.dim(), Some(expected))?;
    }

    if cfg.use_parallel && embeddings.len() >= cfg.parallel_threshold {
        let mut out = Vec::with_capacity(embeddings.len());
        embeddings
            .par_iter()
            .map(quantize_embedding)
            .collect_into_vec(&mut out);
        Ok(out)
    } else {
        Ok(embeddings.iter().map(quantize_embedding).collect())
    }
}

fn check_dim(index: usize, actual: usize, expected: Option<usize>) -> Result<(), QuantizeError> {
    if actual == 0 {
        return Err(QuantizeError::EmptyEmbedding);
    }
    match expected {
        Some(expected) if expected != actual => Err(QuantizeError::DimensionMismatch {
            index,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}
