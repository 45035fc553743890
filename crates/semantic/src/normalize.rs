//! Vector-level post-processing steps: layer normalization, Matryoshka truncation and
//! L2 normalization. All helpers work on plain `f32` slices so they can be applied to
//! pooled rows without extra allocations.

use crate::SemanticError;

/// In-place L2 normalization helper to keep allocations down during hot paths.
/// A zero vector is left untouched.
/// The sum of squares accumulates in `f64` so wide vectors still land within 1e-6 of unit norm.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f64 = v.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    if norm_sq > 0.0 {
        let inv_norm = norm_sq.sqrt().recip();
        for x in v.iter_mut() {
            *x = (f64::from(*x) * inv_norm) as f32;
        }
    }
}

/// Parameter-free layer normalization: `(x - mean) / sqrt(var + eps)` with the biased
/// (population) variance, no learned scale or shift.
pub fn layer_norm_in_place(v: &mut [f32], eps: f32) {
    if v.is_empty() {
        return;
    }
    let n = v.len() as f32;
    let mean = v.iter().sum::<f32>() / n;
    let var = v.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;
    let inv_std = (var + eps).sqrt().recip();
    for x in v.iter_mut() {
        *x = (*x - mean) * inv_std;
    }
}

/// Keeps the first `dim` values. Matryoshka-trained models front-load coarse semantics,
/// so a prefix is a usable embedding on its own.
pub fn matryoshka_truncate(v: &[f32], dim: usize) -> Result<Vec<f32>, SemanticError> {
    if dim == 0 {
        return Err(SemanticError::InvalidConfig(
            "truncation width must be greater than zero".into(),
        ));
    }
    if dim > v.len() {
        return Err(SemanticError::Input(format!(
            "cannot truncate a {}-dimension vector to {dim} dimensions",
            v.len()
        )));
    }
    Ok(v[..dim].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_simple_vector() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize_in_place(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero_vector() {
        let mut v = vec![0.0f32, 0.0, 0.0];
        l2_normalize_in_place(&mut v);
        // Zero vector stays zero, no NaNs.
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn l2_normalize_negative_values() {
        let mut v = vec![-3.0f32, -4.0];
        l2_normalize_in_place(&mut v);
        assert!((v[0] + 0.6).abs() < 1e-6);
        assert!((v[1] + 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_large_vector() {
        let mut v: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        l2_normalize_in_place(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn l2_normalize_empty_slice() {
        let mut v: Vec<f32> = vec![];
        l2_normalize_in_place(&mut v);
        assert!(v.is_empty());
    }

    #[test]
    fn layer_norm_centers_and_scales() {
        let mut v = vec![1.0f32, 2.0, 3.0, 4.0];
        layer_norm_in_place(&mut v, 1e-5);
        let mean: f32 = v.iter().sum::<f32>() / 4.0;
        let var: f32 = v.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn layer_norm_matches_reference_values() {
        // mean 2.5, population variance 1.25
        let mut v = vec![1.0f32, 2.0, 3.0, 4.0];
        layer_norm_in_place(&mut v, 1e-5);
        let inv_std = 1.0 / (1.25f32 + 1e-5).sqrt();
        let expected = [-1.5 * inv_std, -0.5 * inv_std, 0.5 * inv_std, 1.5 * inv_std];
        for (a, b) in v.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn layer_norm_constant_vector_becomes_zero() {
        let mut v = vec![7.5f32; 16];
        layer_norm_in_place(&mut v, 1e-5);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn layer_norm_empty_slice_is_noop() {
        let mut v: Vec<f32> = vec![];
        layer_norm_in_place(&mut v, 1e-5);
        assert!(v.is_empty());
    }

    #[test]
    fn truncate_keeps_prefix() {
        let v = vec![1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(matryoshka_truncate(&v, 2).unwrap(), vec![1.0, 2.0]);
        assert_eq!(matryoshka_truncate(&v, 4).unwrap(), v);
    }

    #[test]
    fn truncate_rejects_wider_than_input() {
        let err = matryoshka_truncate(&[1.0, 2.0], 3).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn truncate_rejects_zero_width() {
        assert!(matches!(
            matryoshka_truncate(&[1.0], 0),
            Err(SemanticError::InvalidConfig(_))
        ));
    }
}
