use rayon::prelude::*;
use sha2::{Digest, Sha256};

use super::{l2_normalize, Embedder};
use crate::error::{RagError, Result};

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic local encoder: signed feature hashing of word tokens and
/// character trigrams into a fixed number of buckets, then L2-normalized.
///
/// Texts sharing vocabulary land close together, which is enough for offline
/// indexing and for tests. It carries no learned semantics.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config("embedding dimension must be positive".into()));
        }
        Ok(Self {
            dimension,
            model_id: format!("hashing/hashing-v1-{}", dimension),
        })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimension];
        let mut features = 0usize;

        for token in tokens(&lowered) {
            self.add_feature(&mut vector, "w", token, WORD_WEIGHT);
            features += 1;
        }

        let chars: Vec<char> = lowered.chars().filter(|c| !c.is_whitespace()).collect();
        for window in chars.windows(3) {
            let gram: String = window.iter().collect();
            self.add_feature(&mut vector, "t", &gram, TRIGRAM_WEIGHT);
            features += 1;
        }

        if features == 0 {
            return Err(RagError::Embedding(
                "text has no indexable tokens".to_string(),
            ));
        }
        l2_normalize(vector).map_err(|_| {
            RagError::Embedding("hashed features cancelled out to a zero vector".to_string())
        })
    }

    fn add_feature(&self, vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(bytes);
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF)
}

/// Alphanumeric runs; CJK ideographs stand alone as single-character tokens.
fn tokens(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        if is_cjk(c) {
            if let Some(s) = start.take() {
                out.push(&text[s..idx]);
            }
            out.push(&text[idx..idx + c.len_utf8()]);
        } else if c.is_alphanumeric() {
            start.get_or_insert(idx);
        } else if let Some(s) = start.take() {
            out.push(&text[s..idx]);
        }
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.par_iter().map(|t| self.embed_text(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{inner_product, is_unit_norm};

    #[test]
    fn test_tokens() {
        assert_eq!(tokens("type 2 diabetes, hba1c"), vec!["type", "2", "diabetes", "hba1c"]);
        assert_eq!(tokens("ab糖尿病"), vec!["ab", "糖", "尿", "病"]);
    }

    #[test]
    fn test_deterministic_unit_vectors() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let a = embedder.embed_text("Aspirin reduces fever").unwrap();
        let b = embedder.embed_text("Aspirin reduces fever").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert!(is_unit_norm(&a));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let query = embedder.embed_text("symptoms of diabetes").unwrap();
        let related = embedder
            .embed_text("Common diabetes symptoms include thirst and frequent urination.")
            .unwrap();
        let unrelated = embedder
            .embed_text("Fractures heal with immobilisation and calcium.")
            .unwrap();
        assert!(inner_product(&query, &related) > inner_product(&query, &unrelated));
    }

    #[test]
    fn test_whitespace_only_is_an_error() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(embedder.embed_text("   ").is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let texts = vec!["insulin".to_string(), "metformin dosage".to_string()];
        let batch = embedder.encode(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], embedder.encode_one("metformin dosage").await.unwrap());
    }
}
