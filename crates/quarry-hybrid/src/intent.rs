//! Embedding-similarity intent classification.
//!
//! Each configured label carries one exemplar text, embedded once at
//! start-up, and the set of document categories it is relevant to. A query
//! is classified by cosine similarity against every exemplar; the result is
//! used to narrow the semantic candidate set and to boost or penalise fused
//! candidates by their `category` / `tags` metadata.
//!
//! The classifier never fails a query: when the exemplars could not be
//! embedded, or the query embedding is unavailable, it reports the degraded
//! `general` result and the pipeline applies no filtering and no boost.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use quarry_core::config::{EmbeddingSettings, IntentLabelSpec, IntentSettings};
use quarry_core::traits::Embedder;
use quarry_core::types::{Chunk, ChunkId, ChunkMetadata, Embedding, GENERAL_CATEGORY};
use quarry_embed::embed_in_batches;
use quarry_vector::cosine_similarity;

#[derive(Debug, Clone)]
pub struct IntentLabel {
    pub name: String,
    pub exemplar: Embedding,
    pub categories: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentScore {
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryIntentResult {
    /// Active intents, best first. Never empty.
    pub intents: Vec<IntentScore>,
    pub primary_intent: String,
    pub confidence: f32,
    pub relevant_categories: BTreeSet<String>,
    /// Every label's confidence after the context boost, best first.
    pub all_scores: Vec<IntentScore>,
    /// True when classification was unavailable and this is the `general` fallback.
    pub degraded: bool,
}

impl QueryIntentResult {
    pub fn general() -> Self {
        Self {
            intents: vec![IntentScore { label: GENERAL_CATEGORY.to_string(), confidence: 0.5 }],
            primary_intent: GENERAL_CATEGORY.to_string(),
            confidence: 0.5,
            relevant_categories: BTreeSet::from([GENERAL_CATEGORY.to_string()]),
            all_scores: Vec::new(),
            degraded: true,
        }
    }

    /// Whether this result is trusted enough to filter and boost with.
    pub fn is_confident(&self, min_confidence: f32) -> bool {
        !self.degraded && self.confidence > min_confidence
    }
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    labels: Vec<IntentLabel>,
    settings: IntentSettings,
}

impl IntentClassifier {
    /// Embed every exemplar once.
    ///
    /// Any embedding failure disables the classifier as a whole (logged,
    /// never returned); a partial label set would skew the ranking.
    pub async fn initialize(
        specs: &[IntentLabelSpec],
        embedder: &dyn Embedder,
        settings: &IntentSettings,
        embedding: &EmbeddingSettings,
    ) -> Self {
        if specs.is_empty() {
            info!("no intent labels configured; intent boosting disabled");
            return Self::disabled(settings);
        }
        let exemplars: Vec<String> = specs.iter().map(|s| s.exemplar.clone()).collect();
        let timeout = Duration::from_millis(embedding.timeout_ms);
        let vectors = match embed_in_batches(embedder, &exemplars, embedding.batch_size, embedding.concurrency, timeout).await {
            Ok(v) => v,
            Err(e) => {
                warn!("intent exemplars could not be embedded, classifier disabled: {e}");
                return Self::disabled(settings);
            }
        };

        let labels: Vec<IntentLabel> = specs
            .iter()
            .zip(vectors)
            .map(|(spec, exemplar)| IntentLabel {
                name: spec.name.clone(),
                exemplar,
                categories: label_categories(&spec.categories),
            })
            .collect();
        info!(labels = labels.len(), "intent classifier initialised");
        Self { labels, settings: settings.clone() }
    }

    pub fn disabled(settings: &IntentSettings) -> Self {
        Self { labels: Vec::new(), settings: settings.clone() }
    }

    pub fn from_labels(labels: Vec<IntentLabel>, settings: &IntentSettings) -> Self {
        Self { labels, settings: settings.clone() }
    }

    pub fn is_enabled(&self) -> bool {
        !self.labels.is_empty()
    }

    pub fn labels(&self) -> &[IntentLabel] {
        &self.labels
    }

    pub fn settings(&self) -> &IntentSettings {
        &self.settings
    }

    /// Embed `query` and classify it with the configured threshold.
    pub async fn classify(
        &self,
        query: &str,
        embedder: &dyn Embedder,
        context_hint: Option<&str>,
        timeout: Duration,
    ) -> QueryIntentResult {
        if !self.is_enabled() {
            return QueryIntentResult::general();
        }
        match quarry_embed::embed_with_timeout(embedder, query, timeout).await {
            Ok(v) => self.classify_embedding(&v, self.settings.threshold, context_hint),
            Err(e) => {
                warn!("query embedding failed, using general intent: {e}");
                QueryIntentResult::general()
            }
        }
    }

    /// Classify an already embedded query.
    ///
    /// A `context_hint` naming a label adds `context_boost` to it (capped
    /// at 1.0) before the threshold applies. When no label clears
    /// `threshold`, the top `fallback_count` labels are kept with their
    /// confidence floored at `fallback_floor`.
    pub fn classify_embedding(&self, query: &[f32], threshold: f32, context_hint: Option<&str>) -> QueryIntentResult {
        if !self.is_enabled() {
            return QueryIntentResult::general();
        }
        let mut scores: Vec<IntentScore> = self
            .labels
            .iter()
            .map(|l| IntentScore { label: l.name.clone(), confidence: cosine_similarity(query, &l.exemplar) })
            .collect();

        if let Some(hint) = context_hint {
            if let Some(s) = scores.iter_mut().find(|s| s.label == hint) {
                let before = s.confidence;
                s.confidence = (s.confidence + self.settings.context_boost).min(1.0);
                debug!(label = hint, before, after = s.confidence, "context boost");
            }
        }
        scores.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

        let mut active: Vec<IntentScore> = scores.iter().filter(|s| s.confidence >= threshold).cloned().collect();
        if active.is_empty() {
            active = scores
                .iter()
                .take(self.settings.fallback_count.max(1))
                .map(|s| IntentScore { label: s.label.clone(), confidence: s.confidence.max(self.settings.fallback_floor) })
                .collect();
        }

        let relevant_categories: BTreeSet<String> = active
            .iter()
            .flat_map(|s| self.categories_for(&s.label).into_iter().flatten().cloned())
            .collect();
        let primary = active[0].clone();
        debug!(primary = %primary.label, confidence = primary.confidence, active = active.len(), "intent classified");

        QueryIntentResult {
            primary_intent: primary.label,
            confidence: primary.confidence,
            intents: active,
            relevant_categories,
            all_scores: scores,
            degraded: false,
        }
    }

    pub fn categories_for(&self, label: &str) -> Option<&BTreeSet<String>> {
        self.labels.iter().find(|l| l.name == label).map(|l| &l.categories)
    }

    /// Ranking multiplier for a chunk under `intent`; 1.0 is neutral.
    ///
    /// Checked in order: primary category, primary tag, secondary intents,
    /// broader relevant category, relevant tag. A non-`general` chunk
    /// matching none of them is penalised; `general` chunks stay neutral.
    pub fn boost_multiplier(&self, intent: &QueryIntentResult, meta: &ChunkMetadata) -> f32 {
        if intent.degraded {
            return 1.0;
        }
        let b = &self.settings.boost;
        let matches = |cats: &BTreeSet<String>| cats.contains(&meta.category) || meta.tags.iter().any(|t| cats.contains(t));

        if let Some(primary) = intent.intents.first() {
            if let Some(cats) = self.categories_for(&primary.label) {
                if cats.contains(&meta.category) {
                    return 1.0 + primary.confidence * b.primary_category;
                }
                if meta.tags.iter().any(|t| cats.contains(t)) {
                    return 1.0 + primary.confidence * b.primary_tag;
                }
            }
        }
        for secondary in intent.intents.iter().take(b.secondary_depth).skip(1) {
            if self.categories_for(&secondary.label).is_some_and(|cats| matches(cats)) {
                return 1.0 + secondary.confidence * b.secondary;
            }
        }
        if intent.relevant_categories.contains(&meta.category) {
            return 1.0 + b.relevant_category;
        }
        if meta.tags.iter().any(|t| intent.relevant_categories.contains(t)) {
            return 1.0 + b.relevant_tag;
        }
        if meta.is_general() { 1.0 } else { b.penalty }
    }

    /// Chunk ids the semantic path should score for `intent`, or `None` for
    /// the whole corpus.
    ///
    /// Keeps chunks whose category or tags fall in the relevant categories,
    /// plus `general` chunks while confidence is below `general_keep_below`.
    /// A subset smaller than `limit * expansion_factor` is widened with the
    /// secondary intents' categories and then capped at
    /// `max_corpus_fraction` of the corpus. An empty subset means no filter.
    pub fn candidate_subset(&self, intent: &QueryIntentResult, chunks: &[Arc<Chunk>], limit: usize) -> Option<HashSet<ChunkId>> {
        let s = &self.settings;
        if !self.is_enabled() || !intent.is_confident(s.filter_confidence) || chunks.is_empty() {
            return None;
        }
        let relevant = &intent.relevant_categories;
        let keep_general = intent.confidence < s.general_keep_below;
        let mut picked: Vec<&Arc<Chunk>> = chunks
            .iter()
            .filter(|c| {
                let m = &c.metadata;
                relevant.contains(&m.category) || m.tags.iter().any(|t| relevant.contains(t)) || (keep_general && m.is_general())
            })
            .collect();
        debug!(corpus = chunks.len(), kept = picked.len(), primary = %intent.primary_intent, "intent filter");

        if picked.len() < limit.saturating_mul(s.expansion_factor) {
            let mut seen: HashSet<&str> = picked.iter().map(|&c| c.id.as_str()).collect();
            for secondary in intent.intents.iter().take(s.boost.secondary_depth).skip(1) {
                let Some(cats) = self.categories_for(&secondary.label) else { continue };
                for c in chunks {
                    let m = &c.metadata;
                    let hit = cats.contains(&m.category) || m.tags.iter().any(|t| cats.contains(t));
                    if hit && seen.insert(c.id.as_str()) {
                        picked.push(c);
                    }
                }
            }
            let cap = (chunks.len() as f64 * f64::from(s.max_corpus_fraction)).floor() as usize;
            if picked.len() > cap {
                picked.truncate(cap);
            }
            debug!(expanded = picked.len(), cap, "intent filter expanded");
        }

        if picked.is_empty() {
            debug!("intent filter left no candidates; scoring the full corpus");
            return None;
        }
        Some(picked.into_iter().map(|c| c.id.clone()).collect())
    }
}

fn label_categories(configured: &[String]) -> BTreeSet<String> {
    let cats: BTreeSet<String> = configured.iter().filter(|c| !c.trim().is_empty()).cloned().collect();
    if cats.is_empty() { BTreeSet::from([GENERAL_CATEGORY.to_string()]) } else { cats }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str, v: Vec<f32>, cats: &[&str]) -> IntentLabel {
        IntentLabel { name: name.to_string(), exemplar: v, categories: cats.iter().map(|c| (*c).to_string()).collect() }
    }

    #[test]
    fn unmapped_label_falls_back_to_general() {
        assert_eq!(label_categories(&[]), BTreeSet::from(["general".to_string()]));
    }

    #[test]
    fn threshold_fallback_keeps_two_floored() {
        let c = IntentClassifier::from_labels(
            vec![label("a", vec![1.0, 0.0, 0.0], &["x"]), label("b", vec![0.0, 1.0, 0.0], &["y"]), label("c", vec![0.0, 0.0, 1.0], &["z"])],
            &IntentSettings::default(),
        );
        let r = c.classify_embedding(&[0.2, 0.1, 0.0], 0.99, None);
        assert_eq!(r.intents.len(), 2);
        assert_eq!(r.primary_intent, "a");
        assert!(r.intents.iter().all(|i| i.confidence >= 0.3));
        assert_eq!(r.relevant_categories, BTreeSet::from(["x".to_string(), "y".to_string()]));
        assert!(!r.degraded);
    }
}
