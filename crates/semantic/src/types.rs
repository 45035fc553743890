use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::SemanticError;

/// Per-token encoder output for a batch of texts.
///
/// `token_embeddings` has shape `[batch, tokens, hidden]` and `attention_mask` has shape
/// `[batch, tokens]` with values restricted to 0/1. Construction validates both.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTokenOutput {
    token_embeddings: Array3<f32>,
    attention_mask: Array2<i64>,
}

impl RawTokenOutput {
    /// Wraps batched encoder output after checking the shapes agree.
    pub fn new(
        token_embeddings: Array3<f32>,
        attention_mask: Array2<i64>,
    ) -> Result<Self, SemanticError> {
        let (batch, tokens, hidden) = token_embeddings.dim();
        let (mask_batch, mask_tokens) = attention_mask.dim();

        if batch != mask_batch || tokens != mask_tokens {
            return Err(SemanticError::Input(format!(
                "attention mask shape [{mask_batch}, {mask_tokens}] does not match token vectors [{batch}, {tokens}, {hidden}]"
            )));
        }
        if hidden == 0 {
            return Err(SemanticError::Input(
                "token vectors have zero hidden dimensions".into(),
            ));
        }
        if let Some(bad) = attention_mask.iter().find(|&&m| m != 0 && m != 1) {
            return Err(SemanticError::Input(format!(
                "attention mask values must be 0 or 1, found {bad}"
            )));
        }

        Ok(Self {
            token_embeddings,
            attention_mask,
        })
    }

    /// Builds a batch of one from `[tokens, hidden]` vectors and a `[tokens]` mask.
    pub fn single(token_vectors: Vec<Vec<f32>>, attention_mask: Vec<i64>) -> Result<Self, SemanticError> {
        let tokens = token_vectors.len();
        if attention_mask.len() != tokens {
            return Err(SemanticError::Input(format!(
                "attention mask has {} entries for {tokens} token vectors",
                attention_mask.len()
            )));
        }
        let hidden = token_vectors.first().map(Vec::len).ok_or_else(|| {
            SemanticError::Input("no token vectors to pool".into())
        })?;
        if let Some(row) = token_vectors.iter().position(|v| v.len() != hidden) {
            return Err(SemanticError::Input(format!(
                "token {row} has {} dimensions, expected {hidden}",
                token_vectors[row].len()
            )));
        }

        let flat: Vec<f32> = token_vectors.into_iter().flatten().collect();
        Self::from_flat(1, tokens, hidden, flat, attention_mask)
    }

    /// Builds a batch from row-major buffers as produced by inference runtimes.
    pub fn from_flat(
        batch: usize,
        tokens: usize,
        hidden: usize,
        token_embeddings: Vec<f32>,
        attention_mask: Vec<i64>,
    ) -> Result<Self, SemanticError> {
        let embeddings = Array3::from_shape_vec((batch, tokens, hidden), token_embeddings)
            .map_err(|e| SemanticError::Input(format!("token vectors: {e}")))?;
        let mask = Array2::from_shape_vec((batch, tokens), attention_mask)
            .map_err(|e| SemanticError::Input(format!("attention mask: {e}")))?;
        Self::new(embeddings, mask)
    }

    pub fn batch_size(&self) -> usize {
        self.token_embeddings.dim().0
    }

    pub fn tokens(&self) -> usize {
        self.token_embeddings.dim().1
    }

    pub fn hidden_size(&self) -> usize {
        self.token_embeddings.dim().2
    }

    pub fn token_embeddings(&self) -> &Array3<f32> {
        &self.token_embeddings
    }

    pub fn attention_mask(&self) -> &Array2<i64> {
        &self.attention_mask
    }
}

/// L2-normalized, truncated sentence embedding.
///
/// Serializes as a bare float array so it can be dropped straight into HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DenseEmbedding {
    /// Final embedding values.
    pub vector: Vec<f32>,
}

impl DenseEmbedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    /// Number of dimensions (`D`).
    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    /// Euclidean norm; 1.0 for every non-degenerate embedding.
    pub fn norm(&self) -> f32 {
        self.vector
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt() as f32
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }
}

impl AsRef<[f32]> for DenseEmbedding {
    fn as_ref(&self) -> &[f32] {
        &self.vector
    }
}
