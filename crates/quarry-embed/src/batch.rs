//! Batched, bounded-concurrency embedding with per-call timeouts.

use std::time::Duration;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use quarry_core::error::{Error, Result};
use quarry_core::traits::Embedder;
use quarry_core::types::Embedding;

/// Embed `texts` in batches of `batch_size`, with at most `concurrency`
/// batches in flight. Output order matches input order.
///
/// Every batch is bounded by `timeout`; the first failure or timeout aborts
/// the whole call. Each returned vector is checked against `embedder.dim()`.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    concurrency: usize,
    timeout: Duration,
) -> Result<Vec<Embedding>> {
    if texts.is_empty() { return Ok(Vec::new()); }
    let batch_size = batch_size.max(1);
    let batches: Vec<&[String]> = texts.chunks(batch_size).collect();
    debug!(texts = texts.len(), batches = batches.len(), concurrency, "embedding corpus");

    let results: Vec<Vec<Embedding>> = stream::iter(batches.into_iter().enumerate())
        .map(|(n, batch)| async move {
            let vectors = call_with_timeout(embedder.embed_batch(batch), timeout).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!("batch {n}: expected {} vectors, got {}", batch.len(), vectors.len())));
            }
            Ok(vectors)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let expected = embedder.dim();
    let mut out = Vec::with_capacity(texts.len());
    for (i, v) in results.into_iter().flatten().enumerate() {
        if v.len() != expected {
            return Err(Error::DimensionMismatch { id: format!("#{i}"), expected, actual: v.len() });
        }
        out.push(v);
    }
    Ok(out)
}

/// Embed a single text under `timeout`.
pub async fn embed_with_timeout(embedder: &dyn Embedder, text: &str, timeout: Duration) -> Result<Embedding> {
    call_with_timeout(embedder.embed(text), timeout).await
}

async fn call_with_timeout<T, F>(fut: F, timeout: Duration) -> Result<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("embedding call failed: {e:#}");
            Err(Error::Embedding(format!("{e:#}")))
        }
        Err(_) => Err(Error::RetrievalTimeout { stage: "embedding", timeout_ms: timeout.as_millis() as u64 }),
    }
}
