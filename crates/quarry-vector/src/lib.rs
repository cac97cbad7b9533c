pub mod similarity;
pub mod store;

pub use similarity::{cosine_similarity, dot, norm};
pub use store::VectorStore;
