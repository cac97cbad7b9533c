//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_FUSION__ALPHA=0.5`). Every setting
//! has a default, so an empty or missing file yields a working engine.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::Normalization;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Load a single TOML file on top of the defaults, without env overlays.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bm25: Bm25Settings,
    pub fusion: FusionSettings,
    pub intent: IntentSettings,
    pub rerank: RerankSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let bad = |msg: String| Err(Error::InvalidConfig(msg));
        if !(self.bm25.k1.is_finite() && self.bm25.k1 >= 0.0) {
            return bad(format!("bm25.k1 must be >= 0, got {}", self.bm25.k1));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return bad(format!("bm25.b must be within [0, 1], got {}", self.bm25.b));
        }
        if !(self.fusion.alpha >= 0.0 && self.fusion.beta >= 0.0) {
            return bad("fusion weights must be non-negative".to_string());
        }
        if !(self.fusion.softmax_temperature > 0.0) {
            return bad("fusion.softmax_temperature must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.intent.max_corpus_fraction) {
            return bad("intent.max_corpus_fraction must be within [0, 1]".to_string());
        }
        if self.embedding.batch_size == 0 || self.embedding.concurrency == 0 || self.rerank.batch_size == 0 {
            return bad("batch sizes and concurrency must be >= 1".to_string());
        }
        if self.search.max_limit == 0 {
            return bad("search.max_limit must be >= 1".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for label in &self.intent.labels {
            if !seen.insert(label.name.as_str()) {
                return bad(format!("duplicate intent label '{}'", label.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdfVariant {
    /// `ln((N - df + 0.5) / (df + 0.5))`; negative for majority terms.
    #[default]
    Canonical,
    /// `ln(1 + (N - df + 0.5) / (df + 0.5))`; always positive.
    Smoothed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Settings {
    pub k1: f32,
    pub b: f32,
    pub idf: IdfVariant,
}

impl Default for Bm25Settings {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75, idf: IdfVariant::Canonical }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    /// Weight of the semantic score.
    pub alpha: f32,
    /// Weight of the lexical score.
    pub beta: f32,
    pub normalization: Normalization,
    pub softmax_temperature: f32,
    /// Each retrieval path fetches `limit * candidate_factor` hits.
    pub candidate_factor: usize,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self { alpha: 0.65, beta: 0.35, normalization: Normalization::MinMax, softmax_temperature: 2.0, candidate_factor: 2 }
    }
}

/// One configured intent: its exemplar text and the document categories
/// it is relevant to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentLabelSpec {
    pub name: String,
    pub exemplar: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl IntentLabelSpec {
    pub fn new(name: &str, exemplar: &str, categories: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            exemplar: exemplar.to_string(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostFactors {
    pub primary_category: f32,
    pub primary_tag: f32,
    pub secondary: f32,
    pub relevant_category: f32,
    pub relevant_tag: f32,
    pub penalty: f32,
    /// Intents at ranks `1..secondary_depth` count as secondary.
    pub secondary_depth: usize,
}

impl Default for BoostFactors {
    fn default() -> Self {
        Self {
            primary_category: 0.6,
            primary_tag: 0.4,
            secondary: 0.3,
            relevant_category: 0.2,
            relevant_tag: 0.1,
            penalty: 0.6,
            secondary_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    pub threshold: f32,
    pub fallback_floor: f32,
    pub fallback_count: usize,
    pub context_boost: f32,
    /// Filtering and boosting only apply above this primary confidence.
    pub filter_confidence: f32,
    /// `general` chunks stay candidates while confidence is below this.
    pub general_keep_below: f32,
    /// Expand the filtered subset when it holds fewer than `limit * expansion_factor` chunks.
    pub expansion_factor: usize,
    /// Cap on an expanded subset, as a fraction of the corpus.
    pub max_corpus_fraction: f32,
    pub boost: BoostFactors,
    pub labels: Vec<IntentLabelSpec>,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            fallback_floor: 0.3,
            fallback_count: 2,
            context_boost: 0.2,
            filter_confidence: 0.3,
            general_keep_below: 0.8,
            expansion_factor: 2,
            max_corpus_fraction: 0.3,
            boost: BoostFactors::default(),
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub enabled: bool,
    /// Share of the pre-rerank score kept when blending with the model score.
    pub prior_weight: f32,
    pub fallback_boost: f32,
    pub min_term_len: usize,
    pub batch_size: usize,
    pub timeout_ms: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self { enabled: false, prior_weight: 0.5, fallback_boost: 0.1, min_term_len: 3, batch_size: 16, timeout_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dim: usize,
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { dim: 384, batch_size: 16, concurrency: 4, timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 5, max_limit: 50 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_path: Option<String>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
