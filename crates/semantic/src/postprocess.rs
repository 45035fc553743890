use crate::normalize::{l2_normalize_in_place, layer_norm_in_place, matryoshka_truncate};
use crate::pool::mean_pool;
use crate::{DenseEmbedding, RawTokenOutput, SemanticConfig, SemanticError};

/// Turns raw per-token encoder output into normalized dense embeddings.
///
/// Steps run in a fixed order: mean pooling, layer normalization across the full hidden
/// width, truncation to `matryoshka_dim`, then L2 normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessor {
    matryoshka_dim: usize,
    layer_norm_eps: f32,
    mask_clamp_min: f32,
}

impl PostProcessor {
    pub fn new(
        matryoshka_dim: usize,
        layer_norm_eps: f32,
        mask_clamp_min: f32,
    ) -> Result<Self, SemanticError> {
        if matryoshka_dim == 0 {
            return Err(SemanticError::InvalidConfig(
                "matryoshka_dim must be greater than zero".into(),
            ));
        }
        Ok(Self {
            matryoshka_dim,
            layer_norm_eps,
            mask_clamp_min,
        })
    }

    pub fn from_config(cfg: &SemanticConfig) -> Result<Self, SemanticError> {
        cfg.validate()?;
        Self::new(cfg.matryoshka_dim, cfg.layer_norm_eps, cfg.mask_clamp_min)
    }

    /// Output width `D`.
    pub fn dim(&self) -> usize {
        self.matryoshka_dim
    }

    /// Produces one embedding per batch element, in batch order.
    pub fn process(&self, raw: &RawTokenOutput) -> Result<Vec<DenseEmbedding>, SemanticError> {
        if self.matryoshka_dim > raw.hidden_size() {
            return Err(SemanticError::Input(format!(
                "token vectors have {} dimensions, need at least {}",
                raw.hidden_size(),
                self.matryoshka_dim
            )));
        }

        let pooled = mean_pool(raw, self.mask_clamp_min);
        let mut out = Vec::with_capacity(raw.batch_size());
        for row in pooled.outer_iter() {
            let mut values = row.to_vec();
            layer_norm_in_place(&mut values, self.layer_norm_eps);
            let mut truncated = matryoshka_truncate(&values, self.matryoshka_dim)?;
            l2_normalize_in_place(&mut truncated);
            out.push(DenseEmbedding::new(truncated));
        }
        Ok(out)
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self {
            matryoshka_dim: crate::config::DEFAULT_MATRYOSHKA_DIM,
            layer_norm_eps: crate::config::DEFAULT_LAYER_NORM_EPS,
            mask_clamp_min: crate::config::DEFAULT_MASK_CLAMP_MIN,
        }
    }
}
