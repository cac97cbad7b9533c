//! quarry-core
//!
//! Domain types, the typed error taxonomy, collaborator traits (embedding,
//! pairwise scoring, corpus supply), configuration and corpus loading shared
//! by the text, vector and hybrid crates.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
