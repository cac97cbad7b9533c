use async_trait::async_trait;

use crate::types::{Chunk, Embedding};

/// Text → dense vector capability.
///
/// Implementations may call a local model or a remote API. Vectors returned
/// for one embedder must all have length `dim()`.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>>;

    async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// (query, passage) → relevance in `[0, 1]`, e.g. a cross-encoder.
#[async_trait]
pub trait PairScorer: Send + Sync {
    /// Called once at startup; an error means the model is unavailable.
    async fn warm_up(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn score_pair(&self, query: &str, passage: &str) -> anyhow::Result<f32>;

    async fn score_batch(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(passages.len());
        for p in passages {
            scores.push(self.score_pair(query, p).await?);
        }
        Ok(scores)
    }
}

/// Supplies the pre-chunked corpus.
pub trait CorpusSource: Send + Sync {
    fn load_corpus(&self) -> anyhow::Result<Vec<Chunk>>;
}
