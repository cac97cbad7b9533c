//! Second-pass reordering of the fused candidate list.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use quarry_core::config::RerankSettings;
use quarry_core::error::Error;
use quarry_core::traits::PairScorer;
use quarry_core::types::ScoredCandidate;

/// Reorders candidates for a query and keeps the best `top_k`.
///
/// Infallible by contract: implementations recover from their own failures
/// and always return a total order.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    async fn rerank(&self, query: &str, candidates: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate>;
}

fn sort_by_score(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal));
}

/// Adds a fixed boost to candidates whose text contains any query term of
/// at least `min_term_len` characters, then re-sorts.
#[derive(Debug, Clone)]
pub struct HeuristicReranker {
    boost: f32,
    min_term_len: usize,
}

impl HeuristicReranker {
    pub fn new(boost: f32, min_term_len: usize) -> Self {
        Self { boost, min_term_len }
    }

    pub fn from_settings(settings: &RerankSettings) -> Self {
        Self::new(settings.fallback_boost, settings.min_term_len)
    }

    fn query_terms(&self, query: &str) -> Vec<String> {
        quarry_text::tokenize(query).into_iter().filter(|t| t.chars().count() >= self.min_term_len).collect()
    }

    pub fn apply(&self, query: &str, mut candidates: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate> {
        let terms = self.query_terms(query);
        if !terms.is_empty() {
            for c in &mut candidates {
                let text = c.text().to_lowercase();
                if terms.iter().any(|t| text.contains(t.as_str())) {
                    c.combined_score += self.boost;
                }
            }
        }
        sort_by_score(&mut candidates);
        candidates.truncate(top_k);
        candidates
    }
}

impl Default for HeuristicReranker {
    fn default() -> Self {
        Self::from_settings(&RerankSettings::default())
    }
}

#[async_trait]
impl Reranker for HeuristicReranker {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn rerank(&self, query: &str, candidates: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate> {
        self.apply(query, candidates, top_k)
    }
}

/// Blends a pairwise relevance model with the fused score:
/// `prior_weight * previous + (1 - prior_weight) * pair`.
///
/// A scorer error or timeout falls back to the heuristic. Output the model
/// returns in the wrong shape (wrong count, non-finite values) leaves the
/// candidates in their incoming order.
pub struct ModelBackedReranker {
    scorer: Arc<dyn PairScorer>,
    prior_weight: f32,
    batch_size: usize,
    timeout: Duration,
    fallback: HeuristicReranker,
}

impl ModelBackedReranker {
    pub fn new(scorer: Arc<dyn PairScorer>, settings: &RerankSettings) -> Self {
        Self {
            scorer,
            prior_weight: settings.prior_weight.clamp(0.0, 1.0),
            batch_size: settings.batch_size.max(1),
            timeout: Duration::from_millis(settings.timeout_ms),
            fallback: HeuristicReranker::from_settings(settings),
        }
    }

    async fn score_all(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, Error> {
        let mut scores = Vec::with_capacity(passages.len());
        for batch in passages.chunks(self.batch_size) {
            match tokio::time::timeout(self.timeout, self.scorer.score_batch(query, batch)).await {
                Ok(Ok(s)) => scores.extend(s),
                Ok(Err(e)) => return Err(Error::Rerank(format!("{e:#}"))),
                Err(_) => return Err(Error::RetrievalTimeout { stage: "rerank", timeout_ms: self.timeout.as_millis() as u64 }),
            }
        }
        Ok(scores)
    }
}

#[async_trait]
impl Reranker for ModelBackedReranker {
    fn name(&self) -> &str {
        "model"
    }

    async fn rerank(&self, query: &str, mut candidates: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate> {
        if candidates.is_empty() {
            return candidates;
        }
        let passages: Vec<String> = candidates.iter().map(|c| c.text().to_string()).collect();
        let scores = match self.score_all(query, &passages).await {
            Ok(s) => s,
            Err(e) => {
                warn!("pairwise reranking failed, using heuristic: {e}");
                return self.fallback.apply(query, candidates, top_k);
            }
        };
        if scores.len() != candidates.len() || scores.iter().any(|s| !s.is_finite()) {
            warn!(expected = candidates.len(), got = scores.len(), "pair scorer returned malformed scores; keeping fused order");
            candidates.truncate(top_k);
            return candidates;
        }

        let prior = self.prior_weight;
        for (c, pair) in candidates.iter_mut().zip(scores) {
            c.combined_score = prior * c.combined_score + (1.0 - prior) * pair;
        }
        sort_by_score(&mut candidates);
        candidates.truncate(top_k);
        debug!(kept = candidates.len(), "model rerank");
        candidates
    }
}

/// Pick the reranker once at start-up: a scorer whose `warm_up` succeeds
/// within the rerank timeout backs a `ModelBackedReranker`; anything else
/// gets the heuristic.
pub async fn select_reranker(scorer: Option<Arc<dyn PairScorer>>, settings: &RerankSettings) -> Arc<dyn Reranker> {
    let Some(scorer) = scorer else {
        info!("no pair scorer configured; using heuristic reranker");
        return Arc::new(HeuristicReranker::from_settings(settings));
    };
    let timeout = Duration::from_millis(settings.timeout_ms);
    match tokio::time::timeout(timeout, scorer.warm_up()).await {
        Ok(Ok(())) => {
            info!("pair scorer ready; using model reranker");
            Arc::new(ModelBackedReranker::new(scorer, settings))
        }
        Ok(Err(e)) => {
            warn!("pair scorer unavailable, using heuristic reranker: {e:#}");
            Arc::new(HeuristicReranker::from_settings(settings))
        }
        Err(_) => {
            warn!(timeout_ms = settings.timeout_ms, "pair scorer warm-up timed out, using heuristic reranker");
            Arc::new(HeuristicReranker::from_settings(settings))
        }
    }
}
