//! Retrieve → filter → fuse → boost → rerank orchestration.
//!
//! `HybridSearchEngine` owns the corpus, both indices, the intent classifier
//! and the reranker. Indexing takes `&mut self`; `search` takes `&self`, so a
//! ready engine can sit behind an `Arc` and serve concurrent queries.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use quarry_core::config::{IntentLabelSpec, Settings};
use quarry_core::corpus::{validate_ids, CorpusRecord};
use quarry_core::error::{Error, Result};
use quarry_core::traits::Embedder;
use quarry_core::types::{Chunk, Embedding, Normalization, QueryContext, SearchHit, SearchMethod, SearchOptions, SearchResult};
use quarry_embed::{embed_in_batches, embed_with_timeout};
use quarry_text::{Bm25Params, LexicalIndex};
use quarry_vector::VectorStore;

use crate::fusion::{merge_candidates, normalize, FusionWeights};
use crate::intent::{IntentClassifier, QueryIntentResult};
use crate::rerank::Reranker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Indexed,
    Ready,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub state: EngineState,
    pub documents: usize,
    pub avg_doc_len: f64,
    pub unique_terms: usize,
    pub vectors: usize,
    pub dim: usize,
    pub intent_labels: usize,
    pub reranker: String,
}

pub struct HybridSearchEngine {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    lexical: LexicalIndex,
    vectors: VectorStore,
    chunks: Vec<Arc<Chunk>>,
    classifier: Option<IntentClassifier>,
    state: EngineState,
}

impl HybridSearchEngine {
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>, reranker: Arc<dyn Reranker>) -> Self {
        let lexical = LexicalIndex::new(Bm25Params::from(&settings.bm25));
        Self {
            settings,
            embedder,
            reranker,
            lexical,
            vectors: VectorStore::new(),
            chunks: Vec::new(),
            classifier: None,
            state: EngineState::Uninitialized,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn classifier(&self) -> Option<&IntentClassifier> {
        self.classifier.as_ref()
    }

    /// Embed every chunk and build both indices.
    ///
    /// Fatal on an empty corpus, invalid ids, an embedding failure or an
    /// embedding of the wrong dimension; the engine keeps its previous state
    /// in that case.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn index(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        let records = chunks.into_iter().map(|chunk| CorpusRecord { chunk, embedding: None }).collect();
        self.index_embedded(records).await
    }

    /// Like [`index`](Self::index), but reuses embeddings the records already
    /// carry and only embeds the rest.
    pub async fn index_embedded(&mut self, records: Vec<CorpusRecord>) -> Result<()> {
        if records.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        validate_ids(records.iter().map(|r| &r.chunk))?;

        let dim = self.embedder.dim();
        let missing: Vec<usize> = records.iter().enumerate().filter(|(_, r)| r.embedding.is_none()).map(|(i, _)| i).collect();
        let texts: Vec<String> = missing.iter().map(|&i| records[i].chunk.text.clone()).collect();
        let e = &self.settings.embedding;
        let computed = embed_in_batches(self.embedder.as_ref(), &texts, e.batch_size, e.concurrency, Duration::from_millis(e.timeout_ms)).await?;
        info!(precomputed = records.len() - missing.len(), embedded = computed.len(), "corpus embeddings ready");

        let mut computed = computed.into_iter();
        let mut chunks = Vec::with_capacity(records.len());
        let mut embeddings: Vec<Embedding> = Vec::with_capacity(records.len());
        for record in records {
            let embedding = match record.embedding {
                Some(v) => v,
                None => computed.next().ok_or_else(|| Error::Embedding("embedder returned too few vectors".to_string()))?,
            };
            if embedding.len() != dim {
                return Err(Error::DimensionMismatch { id: record.chunk.id, expected: dim, actual: embedding.len() });
            }
            chunks.push(Arc::new(record.chunk));
            embeddings.push(embedding);
        }

        let mut lexical = LexicalIndex::new(self.lexical.params());
        lexical.build_index(chunks.iter().map(|c| &**c))?;
        let mut vectors = VectorStore::new();
        vectors.load(chunks.iter().cloned().zip(embeddings))?;

        self.lexical = lexical;
        self.vectors = vectors;
        self.chunks = chunks;
        self.classifier = None;
        self.state = EngineState::Indexed;
        info!(documents = self.chunks.len(), "engine indexed");
        Ok(())
    }

    /// Embed the intent exemplars and move to `Ready`.
    ///
    /// A classifier that could not be initialised is kept disabled; queries
    /// then run without intent filtering.
    pub async fn init_intents(&mut self, labels: &[IntentLabelSpec]) -> Result<()> {
        if self.state == EngineState::Uninitialized {
            return Err(Error::NotIndexed);
        }
        let classifier = IntentClassifier::initialize(labels, self.embedder.as_ref(), &self.settings.intent, &self.settings.embedding).await;
        self.classifier = Some(classifier);
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Move to `Ready` without an intent classifier.
    pub fn skip_intents(&mut self) -> Result<()> {
        if self.state == EngineState::Uninitialized {
            return Err(Error::NotIndexed);
        }
        self.classifier = None;
        self.state = EngineState::Ready;
        info!("intent classification skipped");
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        let lexical = self.lexical.stats();
        EngineStats {
            state: self.state,
            documents: lexical.as_ref().map_or(0, |s| s.documents),
            avg_doc_len: lexical.as_ref().map_or(0.0, |s| s.avg_doc_len),
            unique_terms: lexical.as_ref().map_or(0, |s| s.unique_terms),
            vectors: self.vectors.len(),
            dim: self.vectors.dim(),
            intent_labels: self.classifier.as_ref().map_or(0, |c| c.labels().len()),
            reranker: self.reranker.name().to_string(),
        }
    }

    /// Run one query through the pipeline.
    ///
    /// Errors only for misuse (not indexed, not ready, bad options) or when
    /// a timeout left no retrieval path with anything to return. A failing
    /// path is logged and dropped.
    #[instrument(skip(self, options, context), fields(method = ?options.method))]
    pub async fn search(&self, query: &str, options: &SearchOptions, context: Option<&QueryContext>) -> Result<Vec<SearchResult>> {
        match self.state {
            EngineState::Uninitialized => return Err(Error::NotIndexed),
            EngineState::Indexed => {
                return Err(Error::NotReady("intent classifier not initialised; call init_intents or skip_intents".to_string()))
            }
            EngineState::Ready => {}
        }
        let weights = self.weights(options)?;
        let limit = options.limit.unwrap_or(self.settings.search.default_limit).min(self.settings.search.max_limit);
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let fetch = limit.saturating_mul(self.settings.fusion.candidate_factor.max(1));
        let normalization = options.normalization.unwrap_or(self.settings.fusion.normalization);
        let temperature = self.settings.fusion.softmax_temperature;
        let classifier = self.classifier.as_ref().filter(|c| c.is_enabled());

        // One query embedding serves both intent classification and vector search.
        let embed_timeout = Duration::from_millis(self.settings.embedding.timeout_ms);
        let query_vec = if options.method.uses_semantic() || classifier.is_some() {
            Some(embed_with_timeout(self.embedder.as_ref(), query, embed_timeout).await)
        } else {
            None
        };
        // Intent classification is best-effort; only a timed-out semantic path can fail the query.
        let timed_out = options.method.uses_semantic() && matches!(&query_vec, Some(Err(e)) if e.is_timeout());

        let intent = classifier.map(|c| match &query_vec {
            Some(Ok(v)) => c.classify_embedding(v, c.settings().threshold, context.and_then(|ctx| ctx.domain.as_deref())),
            _ => QueryIntentResult::general(),
        });

        let lexical_hits = if options.method.uses_lexical() {
            match self.lexical.match_terms(query, fetch) {
                Ok(hits) => hits,
                Err(e) => {
                    warn!("lexical search failed, continuing without it: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let semantic_hits = if options.method.uses_semantic() {
            match &query_vec {
                Some(Ok(v)) => {
                    let subset = match (classifier, &intent) {
                        (Some(c), Some(i)) => c.candidate_subset(i, &self.chunks, limit),
                        _ => None,
                    };
                    match self.vectors.search(v, subset.as_ref(), fetch) {
                        Ok(hits) => hits,
                        Err(e) => {
                            warn!("vector search failed, continuing without it: {e}");
                            Vec::new()
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!("query embedding failed, semantic path dropped: {e}");
                    Vec::new()
                }
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        if lexical_hits.is_empty() && semantic_hits.is_empty() {
            if timed_out {
                return Err(Error::RetrievalTimeout { stage: "embedding", timeout_ms: self.settings.embedding.timeout_ms });
            }
            return Ok(Vec::new());
        }

        let lexical = self.normalized(&lexical_hits, normalization, temperature);
        let semantic = self.normalized(&semantic_hits, normalization, temperature);
        let mut candidates = merge_candidates(&lexical, &semantic, weights);

        if let (Some(c), Some(i)) = (classifier, &intent) {
            if i.is_confident(c.settings().filter_confidence) {
                for cand in &mut candidates {
                    let boost = c.boost_multiplier(i, &cand.chunk.metadata);
                    cand.intent_boost = boost;
                    cand.combined_score *= boost;
                }
            }
        }

        candidates.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal));
        candidates.truncate(limit.saturating_mul(2));
        debug!(lexical = lexical_hits.len(), semantic = semantic_hits.len(), fused = candidates.len(), "fusion done");

        let rerank = options.enable_reranking.unwrap_or(self.settings.rerank.enabled);
        if rerank && candidates.len() > 1 {
            candidates = self.reranker.rerank(query, candidates, limit).await;
        }
        candidates.truncate(limit);
        Ok(candidates.into_iter().map(SearchResult::from).collect())
    }

    fn weights(&self, options: &SearchOptions) -> Result<FusionWeights> {
        let alpha = options.alpha.unwrap_or(self.settings.fusion.alpha);
        let beta = options.beta.unwrap_or(self.settings.fusion.beta);
        for (name, w) in [("alpha", alpha), ("beta", beta)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidOptions(format!("{name} must be a finite, non-negative weight, got {w}")));
            }
        }
        Ok(match options.method {
            SearchMethod::Lexical => FusionWeights { alpha: 0.0, beta: 1.0 },
            SearchMethod::Semantic => FusionWeights { alpha: 1.0, beta: 0.0 },
            SearchMethod::Hybrid => FusionWeights { alpha, beta },
        })
    }

    fn normalized(&self, hits: &[SearchHit], method: Normalization, temperature: f32) -> Vec<(Arc<Chunk>, f32)> {
        let raw: Vec<f32> = hits.iter().map(|h| h.score).collect();
        let scaled = normalize(&raw, method, temperature);
        hits.iter()
            .zip(scaled)
            .filter_map(|(h, s)| self.chunks.get(h.index).map(|c| (Arc::clone(c), s)))
            .collect()
    }
}
