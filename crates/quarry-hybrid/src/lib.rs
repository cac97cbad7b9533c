//! Hybrid retrieval: BM25 and cosine similarity fused into one ranking,
//! narrowed and boosted by intent, optionally reranked pairwise.

pub mod engine;
pub mod fusion;
pub mod intent;
pub mod rerank;

pub use engine::{EngineState, EngineStats, HybridSearchEngine};
pub use fusion::{fuse, merge_candidates, normalize, FusionWeights};
pub use intent::{IntentClassifier, IntentLabel, IntentScore, QueryIntentResult};
pub use rerank::{select_reranker, HeuristicReranker, ModelBackedReranker, Reranker};
