use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::config::RerankSettings;
use quarry_core::traits::PairScorer;
use quarry_core::types::{Chunk, ScoredCandidate};
use quarry_hybrid::{select_reranker, HeuristicReranker, ModelBackedReranker, Reranker};

fn candidate(id: &str, text: &str, score: f32) -> ScoredCandidate {
    ScoredCandidate::new(Arc::new(Chunk::new(id, text)), score)
}

fn ids(cands: &[ScoredCandidate]) -> Vec<&str> {
    cands.iter().map(ScoredCandidate::id).collect()
}

fn sample() -> Vec<ScoredCandidate> {
    vec![
        candidate("voice", "Voice channels need the speak permission", 0.55),
        candidate("reset", "How to reset your account password", 0.50),
        candidate("policy", "Password rules for new members", 0.48),
    ]
}

#[tokio::test]
async fn heuristic_prefers_term_matches_over_higher_prior() {
    let reranker = HeuristicReranker::default();
    let out = reranker.rerank("password reset", sample(), 2).await;
    assert_eq!(ids(&out), vec!["reset", "policy"]);
    assert!((out[0].combined_score - 0.60).abs() < 1e-6);
}

#[tokio::test]
async fn heuristic_ignores_short_terms() {
    let reranker = HeuristicReranker::default();
    // "of" and "to" are too short to count
    let out = reranker.rerank("to of", sample(), 3).await;
    assert_eq!(ids(&out), vec!["voice", "reset", "policy"]);
}

struct FixedScorer(Vec<f32>);

#[async_trait]
impl PairScorer for FixedScorer {
    async fn score_pair(&self, _query: &str, _passage: &str) -> anyhow::Result<f32> {
        Ok(0.0)
    }

    async fn score_batch(&self, _query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.iter().copied().take(passages.len()).collect())
    }
}

struct BrokenScorer;

#[async_trait]
impl PairScorer for BrokenScorer {
    async fn warm_up(&self) -> anyhow::Result<()> {
        anyhow::bail!("model weights missing")
    }

    async fn score_pair(&self, _query: &str, _passage: &str) -> anyhow::Result<f32> {
        anyhow::bail!("model weights missing")
    }
}

#[tokio::test]
async fn model_scores_blend_with_prior() {
    let scorer = Arc::new(FixedScorer(vec![0.0, 0.2, 1.0]));
    let reranker = ModelBackedReranker::new(scorer, &RerankSettings::default());
    let out = reranker.rerank("password reset", sample(), 3).await;
    assert_eq!(ids(&out), vec!["policy", "reset", "voice"]);
    assert!((out[0].combined_score - (0.5 * 0.48 + 0.5 * 1.0)).abs() < 1e-6);
    assert!((out[2].combined_score - 0.5 * 0.55).abs() < 1e-6);
}

#[tokio::test]
async fn model_failure_falls_back_to_heuristic() {
    let reranker = ModelBackedReranker::new(Arc::new(BrokenScorer), &RerankSettings::default());
    let out = reranker.rerank("password reset", sample(), 2).await;
    assert_eq!(ids(&out), vec!["reset", "policy"]);
}

#[tokio::test]
async fn malformed_scores_keep_incoming_order() {
    let reranker = ModelBackedReranker::new(Arc::new(FixedScorer(vec![1.0])), &RerankSettings::default());
    let out = reranker.rerank("password reset", sample(), 2).await;
    assert_eq!(ids(&out), vec!["voice", "reset"]);
    assert_eq!(out[0].combined_score, 0.55);
}

#[tokio::test]
async fn selection_depends_on_warm_up() {
    let settings = RerankSettings::default();
    assert_eq!(select_reranker(None, &settings).await.name(), "heuristic");
    assert_eq!(select_reranker(Some(Arc::new(BrokenScorer)), &settings).await.name(), "heuristic");
    assert_eq!(select_reranker(Some(Arc::new(FixedScorer(vec![]))), &settings).await.name(), "model");
}
