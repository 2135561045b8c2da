//! Deterministic feature-hashing embedder
//!
//! Needs no model download, so it backs offline runs and tests. Texts sharing
//! words land close together; there is no notion of synonymy.

use super::EmbeddingProvider;
use anyhow::Result;
use sha2::{Digest, Sha256};

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in features(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// Lowercased words, with camelCase identifiers also split into their parts
fn features(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let lower = word.to_lowercase();
        let parts = split_camel_case(word);
        if parts.len() > 1 {
            out.extend(parts.into_iter().map(|p| p.to_lowercase()));
        }
        out.push(lower);
    }
    out
}

fn split_camel_case(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    for window in chars.windows(2) {
        let (_, prev) = window[0];
        let (idx, cur) = window[1];
        if prev.is_lowercase() && cur.is_uppercase() {
            parts.push(&word[start..idx]);
            start = idx;
        }
    }
    parts.push(&word[start..]);
    parts
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::cosine_similarity;

    #[test]
    fn test_dimension_and_normalization() {
        let embedder = HashingEmbedder::new(128);
        let v = embedder.embed("charge the customer card").unwrap();
        assert_eq!(v.len(), 128);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashingEmbedder::new(64);
        assert_eq!(
            embedder.embed("PaymentService").unwrap(),
            embedder.embed("PaymentService").unwrap()
        );
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashingEmbedder::new(256);
        let query = embedder.embed("payment processing").unwrap();
        let related = embedder.embed("Service handling payment processing for orders").unwrap();
        let unrelated = embedder.embed("Renders the login page template").unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_camel_case_split() {
        assert_eq!(split_camel_case("PaymentService"), vec!["Payment", "Service"]);
        assert_eq!(split_camel_case("HTTPClient"), vec!["HTTPClient"]);
        assert_eq!(split_camel_case("run"), vec!["run"]);
        let feats = features("PaymentService.charge");
        assert!(feats.contains(&"payment".to_string()));
        assert!(feats.contains(&"paymentservice".to_string()));
        assert!(feats.contains(&"charge".to_string()));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_batch_preserves_order() {
        let embedder = HashingEmbedder::new(32);
        let batch = embedder
            .embed_batch(vec!["alpha".to_string(), "beta".to_string()])
            .unwrap();
        assert_eq!(batch[0], embedder.embed("alpha").unwrap());
        assert_eq!(batch[1], embedder.embed("beta").unwrap());
    }
}
