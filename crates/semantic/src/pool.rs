use ndarray::{Array2, Axis};

use crate::RawTokenOutput;

/// Attention-mask-weighted mean over the token axis.
///
/// Each token vector is scaled by its mask value and summed; the sum is divided by the
/// mask total for that batch element, floored at `clamp_min` so an all-zero mask yields a
/// zero vector instead of a division by zero. Returns `[batch, hidden]`.
pub fn mean_pool(raw: &RawTokenOutput, clamp_min: f32) -> Array2<f32> {
    let embeddings = raw.token_embeddings();
    let masks = raw.attention_mask();
    let mut pooled = Array2::<f32>::zeros((raw.batch_size(), raw.hidden_size()));

    for (b, mut row) in pooled.outer_iter_mut().enumerate() {
        let tokens = embeddings.index_axis(Axis(0), b);
        let mask = masks.index_axis(Axis(0), b);
        let mut mask_sum = 0.0f32;
        for (token, &m) in tokens.outer_iter().zip(mask.iter()) {
            let weight = m as f32;
            row.scaled_add(weight, &token);
            mask_sum += weight;
        }
        let denom = mask_sum.max(clamp_min);
        row.mapv_inplace(|v| v / denom);
    }

    pooled
}
