pub mod hashing;
pub mod provider;

pub use hashing::HashingEmbedder;
pub use provider::EmbeddingProvider;

use crate::error::{RagError, Result};

/// Default dimension of the local hashing encoder (same as MiniLM-class models)
pub const EMBEDDING_DIM: usize = 384;

/// How far from 1.0 an L2 norm may drift and still count as unit length.
pub const NORM_TOLERANCE: f32 = 1e-3;

/// Text -> vector capability shared by indexing and querying.
///
/// Implementations return vectors of exactly [`Embedder::dimension`] entries
/// with unit L2 norm, so inner product equals cosine similarity. The same
/// encoder (same `model_id`) must serve both sides of an index.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Stable identity of the underlying model, recorded in build manifests.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".into()))
    }
}

pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn is_unit_norm(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= NORM_TOLERANCE
}

/// Scale to unit length. A zero vector has no direction and is rejected.
pub fn l2_normalize(mut v: Vec<f32>) -> Result<Vec<f32>> {
    let norm = l2_norm(&v);
    if norm == 0.0 || !norm.is_finite() {
        return Err(RagError::Embedding(format!(
            "cannot normalize vector with norm {}",
            norm
        )));
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Ok(v)
}

/// Normalize a provider batch and hold it to the declared dimension.
pub(crate) fn finish_batch(
    raw: Vec<Vec<f32>>,
    expected_len: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    if raw.len() != expected_len {
        return Err(RagError::Embedding(format!(
            "expected {} embeddings, provider returned {}",
            expected_len,
            raw.len()
        )));
    }
    raw.into_iter()
        .map(|v| {
            if v.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
            l2_normalize(v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_to_unit_length() {
        let v = l2_normalize(vec![3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(is_unit_norm(&v));
    }

    #[test]
    fn test_zero_vector_rejected() {
        assert!(l2_normalize(vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_inner_product() {
        assert_eq!(inner_product(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
    }

    #[test]
    fn test_finish_batch_rejects_wrong_dimension() {
        let err = finish_batch(vec![vec![1.0, 0.0, 0.0]], 1, 2).unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_finish_batch_rejects_short_batch() {
        assert!(finish_batch(vec![], 1, 2).is_err());
    }
}
