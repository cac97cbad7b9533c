//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub type ChunkId = String;
pub type Embedding = Vec<f32>;

/// Category assigned to chunks whose source did not provide one.
pub const GENERAL_CATEGORY: &str = "general";

/// Free-form metadata value: a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    List(Vec<String>),
}

/// Metadata every chunk carries.
///
/// `category` and `tags` drive intent filtering and boosting; they are
/// defaulted once at ingestion so read sites never have to guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

fn default_category() -> String {
    GENERAL_CATEGORY.to_string()
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self { category: default_category(), tags: BTreeSet::new(), source: String::new(), extra: BTreeMap::new() }
    }
}

impl ChunkMetadata {
    pub fn with_category(category: impl Into<String>) -> Self {
        Self { category: category.into(), ..Self::default() }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn is_general(&self) -> bool {
        self.category == GENERAL_CATEGORY
    }
}

/// Immutable unit of retrievable text.
///
/// - `id`: stable identifier, the only join key between retrieval paths
/// - `text`: UTF-8 payload that is tokenized and embedded
/// - `metadata`: category / tags / source plus free-form extras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: ChunkMetadata::default() }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Text,
}

/// A raw hit from one engine, before fusion.
///
/// `id` matches `Chunk::id`; `index` is the chunk's position in the corpus
/// the engine was built from. `score` is engine-specific, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub index: usize,
    pub score: f32,
    pub source: SourceKind,
}

/// Which retrieval path(s) contributed a fused candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Lexical,
    Semantic,
    Hybrid,
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSource::Lexical => f.write_str("lexical"),
            MatchSource::Semantic => f.write_str("semantic"),
            MatchSource::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// Per-query candidate carried from fusion through reranking.
///
/// `lexical_score` and `semantic_score` are the normalized per-path scores
/// (0 when the path did not find the chunk); `intent_boost` is the
/// multiplier applied to `combined_score` (1.0 is neutral).
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk: Arc<Chunk>,
    pub lexical_score: f32,
    pub semantic_score: f32,
    pub intent_boost: f32,
    pub combined_score: f32,
    pub source: MatchSource,
}

impl ScoredCandidate {
    pub fn new(chunk: Arc<Chunk>, combined_score: f32) -> Self {
        Self {
            chunk,
            lexical_score: 0.0,
            semantic_score: 0.0,
            intent_boost: 1.0,
            combined_score,
            source: MatchSource::Hybrid,
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Lexical,
    Semantic,
    #[default]
    Hybrid,
}

impl SearchMethod {
    pub fn uses_lexical(self) -> bool {
        matches!(self, SearchMethod::Lexical | SearchMethod::Hybrid)
    }

    pub fn uses_semantic(self) -> bool {
        matches!(self, SearchMethod::Semantic | SearchMethod::Hybrid)
    }
}

impl std::str::FromStr for SearchMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lexical" | "bm25" | "keyword" => Ok(SearchMethod::Lexical),
            "semantic" | "vector" => Ok(SearchMethod::Semantic),
            "hybrid" => Ok(SearchMethod::Hybrid),
            other => Err(format!("unknown search method '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    #[default]
    MinMax,
    Softmax,
    None,
}

/// Per-query knobs of the public search API.
///
/// Unset fields fall back to the engine's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub method: SearchMethod,
    pub limit: Option<usize>,
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub enable_reranking: Option<bool>,
    pub normalization: Option<Normalization>,
}

impl SearchOptions {
    pub fn new(method: SearchMethod, limit: usize) -> Self {
        Self { method, limit: Some(limit), ..Self::default() }
    }

    pub fn weights(mut self, alpha: f32, beta: f32) -> Self {
        self.alpha = Some(alpha);
        self.beta = Some(beta);
        self
    }

    pub fn reranking(mut self, enabled: bool) -> Self {
        self.enable_reranking = Some(enabled);
        self
    }
}

/// Optional deployment context for a query (e.g. the kind of community or
/// product the caller serves). `domain` names an intent label to favour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default, alias = "type")]
    pub domain: Option<String>,
}

impl QueryContext {
    pub fn domain(domain: impl Into<String>) -> Self {
        Self { domain: Some(domain.into()) }
    }
}

/// One entry of the public result list.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: ChunkId,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
    pub lexical_score: f32,
    pub semantic_score: f32,
    pub intent_boost: f32,
    pub source: MatchSource,
}

impl From<ScoredCandidate> for SearchResult {
    fn from(c: ScoredCandidate) -> Self {
        Self {
            id: c.chunk.id.clone(),
            content: c.chunk.text.clone(),
            metadata: c.chunk.metadata.clone(),
            score: c.combined_score,
            lexical_score: c.lexical_score,
            semantic_score: c.semantic_score,
            intent_boost: c.intent_boost,
            source: c.source,
        }
    }
}
