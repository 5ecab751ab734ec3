//! Shared test fixtures: deterministic embedding providers that need no
//! model download
#![allow(dead_code)]

use ragdex::embedding::{EmbeddingError, EmbeddingProvider};
use ragdex::index::tokenize;

pub const DIMENSION: usize = 64;

/// Hashed bag-of-words embedder. Texts sharing tokens land in shared
/// buckets, so cosine similarity tracks lexical overlap deterministically.
pub struct HashedBagProvider;

pub fn bag_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMENSION];
    for token in tokenize(text) {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in token.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        v[(h % DIMENSION as u64) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

impl EmbeddingProvider for HashedBagProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }
        Ok(bag_vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "hashed-bag"
    }
}

/// Panics on any batch whose text contains the marker; simulates a
/// crashing native embedding backend
pub struct PanickingProvider {
    pub marker: &'static str,
}

impl EmbeddingProvider for PanickingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        assert!(!text.contains(self.marker), "backend crashed");
        HashedBagProvider.embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "hashed-bag"
    }
}

/// Fails any batch whose text contains the poison marker, otherwise
/// behaves exactly like [`HashedBagProvider`]
pub struct PoisonedProvider {
    pub poison: &'static str,
}

impl EmbeddingProvider for PoisonedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.contains(self.poison) {
            return Err(EmbeddingError::GenerationError(
                "poisoned input".to_string(),
            ));
        }
        HashedBagProvider.embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "hashed-bag"
    }
}
