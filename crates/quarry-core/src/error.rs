use thiserror::Error;

/// Errors surfaced by indexing and retrieval.
///
/// Construction-time variants (`EmptyCorpus`, `DimensionMismatch`,
/// `InvalidCorpus`) are fatal: an engine that reports them never serves
/// queries. Per-query variants are mostly recovered inside the pipeline and
/// only reach the caller when no retrieval path could produce anything.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Corpus is empty; nothing to index")]
    EmptyCorpus,

    #[error("Index has not been built")]
    NotIndexed,

    #[error("Engine not ready: {0}")]
    NotReady(String),

    #[error("Embedding dimension mismatch for '{id}': expected {expected}, got {actual}")]
    DimensionMismatch { id: String, expected: usize, actual: usize },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Rerank failed: {0}")]
    Rerank(String),

    #[error("Retrieval timed out during {stage} after {timeout_ms}ms")]
    RetrievalTimeout { stage: &'static str, timeout_ms: u64 },

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("Invalid search options: {0}")]
    InvalidOptions(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for errors raised by a timed-out external call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::RetrievalTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
