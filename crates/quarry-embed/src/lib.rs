//! Embedding helpers: a deterministic hashing embedder plus batched,
//! time-bounded calls against any `Embedder`.

pub mod batch;
pub mod hashing;
pub mod normalize;

use std::sync::Arc;

use tracing::info;

use quarry_core::config::EmbeddingSettings;
use quarry_core::traits::Embedder;

pub use batch::{embed_in_batches, embed_with_timeout};
pub use hashing::HashingEmbedder;
pub use normalize::{l2_norm, l2_normalize};

/// The built-in embedder for the configured dimension.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Arc<dyn Embedder> {
    info!(dim = settings.dim, "using hashing embedder");
    Arc::new(HashingEmbedder::new(settings.dim))
}
