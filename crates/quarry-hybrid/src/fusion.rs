//! Score normalisation and weighted fusion of the lexical and semantic paths.

use std::collections::HashMap;
use std::sync::Arc;

use quarry_core::types::{Chunk, ChunkId, MatchSource, Normalization, ScoredCandidate};

/// Map `scores` onto a common scale, preserving order and length.
///
/// - `MinMax`: `(s - min) / (max - min)`, or 0.5 everywhere when all scores are equal.
/// - `Softmax`: numerically stable softmax of `s / temperature`.
/// - `None`: scores pass through unchanged.
pub fn normalize(scores: &[f32], method: Normalization, temperature: f32) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    match method {
        Normalization::MinMax => min_max(scores),
        Normalization::Softmax => softmax(scores, temperature),
        Normalization::None => scores.to_vec(),
    }
}

pub fn min_max(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if !(range > 0.0) {
        return vec![0.5; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

pub fn softmax(scores: &[f32], temperature: f32) -> Vec<f32> {
    let t = if temperature > 0.0 { f64::from(temperature) } else { 1.0 };
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = scores.iter().map(|s| ((f64::from(*s) - f64::from(max)) / t).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| (e / sum) as f32).collect()
}

/// `semantic * alpha + lexical * beta`.
pub fn fuse(lexical: f32, semantic: f32, alpha: f32, beta: f32) -> f32 {
    semantic * alpha + lexical * beta
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    /// Semantic weight.
    pub alpha: f32,
    /// Lexical weight.
    pub beta: f32,
}

/// Join the two normalized hit lists on chunk id and compute fused scores.
///
/// Candidates appear in first-seen order (lexical hits, then semantic-only
/// hits); a chunk missing from one path scores 0 on that path. The result is
/// not sorted.
pub fn merge_candidates(
    lexical: &[(Arc<Chunk>, f32)],
    semantic: &[(Arc<Chunk>, f32)],
    weights: FusionWeights,
) -> Vec<ScoredCandidate> {
    let mut by_id: HashMap<ChunkId, usize> = HashMap::new();
    let mut out: Vec<ScoredCandidate> = Vec::with_capacity(lexical.len() + semantic.len());

    for (chunk, score) in lexical {
        by_id.insert(chunk.id.clone(), out.len());
        let mut c = ScoredCandidate::new(Arc::clone(chunk), 0.0);
        c.lexical_score = score.max(0.0);
        c.source = MatchSource::Lexical;
        out.push(c);
    }
    for (chunk, score) in semantic {
        let score = score.max(0.0);
        match by_id.get(&chunk.id) {
            Some(&i) => {
                out[i].semantic_score = score;
                out[i].source = MatchSource::Hybrid;
            }
            None => {
                by_id.insert(chunk.id.clone(), out.len());
                let mut c = ScoredCandidate::new(Arc::clone(chunk), 0.0);
                c.semantic_score = score;
                c.source = MatchSource::Semantic;
                out.push(c);
            }
        }
    }
    for c in &mut out {
        c.combined_score = fuse(c.lexical_score, c.semantic_score, weights.alpha, weights.beta);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_spans_unit_interval() {
        assert_eq!(min_max(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn negative_scores_normalize_too() {
        let n = min_max(&[-0.4, -0.1]);
        assert_eq!(n, vec![0.0, 1.0]);
    }

    #[test]
    fn softmax_handles_large_inputs() {
        let s = softmax(&[1000.0, 1000.0], 2.0);
        assert!((s[0] - 0.5).abs() < 1e-6);
        assert!(s.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn none_passes_through() {
        assert_eq!(normalize(&[3.5, -1.0], Normalization::None, 2.0), vec![3.5, -1.0]);
    }
}
