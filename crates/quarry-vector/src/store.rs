//! Exhaustive cosine search over an in-memory embedding matrix.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use quarry_core::error::{Error, Result};
use quarry_core::types::{Chunk, ChunkId, Embedding, SearchHit, SourceKind};

use crate::similarity::cosine_similarity;

#[derive(Debug, Clone, Default)]
pub struct VectorStore {
	chunks: Vec<Arc<Chunk>>,
	embeddings: Vec<Embedding>,
	positions: HashMap<ChunkId, usize>,
	dim: usize,
	loaded: bool,
}

impl VectorStore {
	pub fn new() -> Self { Self::default() }

	/// Replace the store's contents with `entries`.
	///
	/// The first vector fixes the dimension; any later vector of another
	/// length fails the whole load and leaves the previous contents intact.
	pub fn load<C, I>(&mut self, entries: I) -> Result<()>
	where
		C: Into<Arc<Chunk>>,
		I: IntoIterator<Item = (C, Embedding)>,
	{
		let mut chunks = Vec::new();
		let mut embeddings = Vec::new();
		let mut positions = HashMap::new();
		let mut dim = None;
		for (chunk, embedding) in entries {
			let chunk: Arc<Chunk> = chunk.into();
			let expected = *dim.get_or_insert(embedding.len());
			if embedding.len() != expected {
				return Err(Error::DimensionMismatch { id: chunk.id.clone(), expected, actual: embedding.len() });
			}
			positions.insert(chunk.id.clone(), chunks.len());
			chunks.push(chunk);
			embeddings.push(embedding);
		}
		self.chunks = chunks;
		self.embeddings = embeddings;
		self.positions = positions;
		self.dim = dim.unwrap_or(0);
		self.loaded = true;
		info!(vectors = self.chunks.len(), dim = self.dim, "vector store loaded");
		Ok(())
	}

	pub fn is_loaded(&self) -> bool { self.loaded }

	pub fn len(&self) -> usize { self.chunks.len() }

	pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

	pub fn dim(&self) -> usize { self.dim }

	pub fn get(&self, id: &str) -> Option<(&Arc<Chunk>, &Embedding)> {
		self.positions.get(id).map(|&i| (&self.chunks[i], &self.embeddings[i]))
	}

	/// Rank stored chunks by cosine similarity to `query`, best first, ties
	/// in load order.
	///
	/// With `subset`, only chunks whose id is in it are scored; an empty
	/// subset scores nothing.
	pub fn search(&self, query: &[f32], subset: Option<&HashSet<ChunkId>>, limit: usize) -> Result<Vec<SearchHit>> {
		if !self.loaded { return Err(Error::NotIndexed); }
		if self.chunks.is_empty() || limit == 0 { return Ok(Vec::new()); }
		if query.len() != self.dim {
			return Err(Error::DimensionMismatch { id: "<query>".to_string(), expected: self.dim, actual: query.len() });
		}

		let mut scored: Vec<(usize, f32)> = self
			.embeddings
			.iter()
			.enumerate()
			.filter(|(i, _)| subset.map_or(true, |s| s.contains(&self.chunks[*i].id)))
			.map(|(i, e)| (i, cosine_similarity(query, e)))
			.collect();
		scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
		scored.truncate(limit);
		debug!(scanned = self.chunks.len(), subset = subset.map(HashSet::len), hits = scored.len(), "vector search");

		Ok(scored
			.into_iter()
			.map(|(index, score)| SearchHit { id: self.chunks[index].id.clone(), index, score, source: SourceKind::Vector })
			.collect())
	}
}
