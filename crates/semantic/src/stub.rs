use fxhash::hash64;

use crate::encoder::TokenEncoder;
use crate::{RawTokenOutput, SemanticConfig, SemanticError};

const BOS_SEED: u64 = 0x6273_5f62_6f73_0001;
const EOS_SEED: u64 = 0x6273_5f65_6f73_0002;

/// Deterministic encoder used when no model assets are configured.
///
/// Texts are split on whitespace, framed by two special tokens and truncated to
/// `max_sequence_length`. Each token vector is derived from a hash of the token, so identical
/// words produce identical vectors regardless of position and output never depends on
/// anything but the input text.
#[derive(Debug, Clone)]
pub struct StubEncoder {
    name: String,
    hidden_size: usize,
    max_sequence_length: usize,
}

impl StubEncoder {
    pub fn new(name: impl Into<String>, hidden_size: usize, max_sequence_length: usize) -> Self {
        Self {
            name: name.into(),
            hidden_size,
            max_sequence_length: max_sequence_length.max(2),
        }
    }

    pub fn from_config(cfg: &SemanticConfig) -> Self {
        Self::new(cfg.model_name.clone(), cfg.hidden_size, cfg.max_sequence_length)
    }

    fn token_seeds(&self, text: &str) -> Vec<u64> {
        let mut seeds = Vec::with_capacity(16);
        seeds.push(BOS_SEED);
        seeds.extend(
            text.split_whitespace()
                .take(self.max_sequence_length - 2)
                .map(|tok| hash64(tok.as_bytes())),
        );
        seeds.push(EOS_SEED);
        seeds
    }

    fn fill_token(&self, seed: u64, out: &mut [f32]) {
        for (dim, value) in out.iter_mut().enumerate() {
            let mixed = splitmix64(seed ^ (dim as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
            // Top 24 bits mapped onto [-1, 1).
            *value = (mixed >> 40) as f32 / (1u64 << 23) as f32 - 1.0;
        }
    }
}

impl TokenEncoder for StubEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn encode(&self, texts: &[&str]) -> Result<RawTokenOutput, SemanticError> {
        if texts.is_empty() {
            return Err(SemanticError::Input("no texts to encode".into()));
        }

        let sequences: Vec<Vec<u64>> = texts.iter().map(|t| self.token_seeds(t)).collect();
        let tokens = sequences.iter().map(Vec::len).max().unwrap_or(2);
        let hidden = self.hidden_size;

        let mut embeddings = vec![0f32; texts.len() * tokens * hidden];
        let mut mask = vec![0i64; texts.len() * tokens];
        for (b, seeds) in sequences.iter().enumerate() {
            for (t, &seed) in seeds.iter().enumerate() {
                let offset = (b * tokens + t) * hidden;
                self.fill_token(seed, &mut embeddings[offset..offset + hidden]);
                mask[b * tokens + t] = 1;
            }
        }

        RawTokenOutput::from_flat(texts.len(), tokens, hidden, embeddings, mask)
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
