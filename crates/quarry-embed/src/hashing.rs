use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use quarry_core::traits::Embedder;
use quarry_core::types::Embedding;

use crate::normalize::l2_normalize;

/// Feature-hashing embedder: every token of `quarry_text::tokenize`
/// (lowercased, split on punctuation and whitespace) is hashed
/// into one of `dim` buckets with a signed weight, and the result is
/// L2-normalized.
///
/// Deterministic and model-free. Texts sharing tokens get a positive cosine
/// similarity, identical texts get 1.0, and a text with no tokens maps to
/// the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        for token in quarry_text::tokenize(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let magnitude = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            let sign = if h & (1 << 31) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign * magnitude;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}
