//! In-memory BM25 index over a fixed corpus.
//!
//! The index is rebuilt in full by every `build_index` call: per-document
//! lengths, postings, document frequencies, average length and IDF are all
//! derived from the documents passed in. There is no incremental update.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, info, instrument};

use quarry_core::config::{Bm25Settings, IdfVariant};
use quarry_core::error::{Error, Result};
use quarry_core::types::{Chunk, ChunkId, SearchHit, SourceKind};

use crate::tokenize::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
	/// Term-frequency saturation.
	pub k1: f64,
	/// Length normalisation, 0 disables it.
	pub b: f64,
	pub idf: IdfVariant,
}

impl Default for Bm25Params {
	fn default() -> Self { Self { k1: 1.2, b: 0.75, idf: IdfVariant::Canonical } }
}

impl From<&Bm25Settings> for Bm25Params {
	fn from(s: &Bm25Settings) -> Self { Self { k1: f64::from(s.k1), b: f64::from(s.b), idf: s.idf } }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
	pub documents: usize,
	pub avg_doc_len: f64,
	pub unique_terms: usize,
}

/// term → (document position, term frequency), in document order.
type Postings = HashMap<String, Vec<(usize, u32)>>;

pub struct LexicalIndex {
	params: Bm25Params,
	analyzer: Analyzer,
	ids: Vec<ChunkId>,
	doc_lens: Vec<usize>,
	postings: Postings,
	idf: HashMap<String, f64>,
	avg_doc_len: f64,
	indexed: bool,
}

impl LexicalIndex {
	pub fn new(params: Bm25Params) -> Self {
		Self {
			params,
			analyzer: Analyzer::new(),
			ids: Vec::new(),
			doc_lens: Vec::new(),
			postings: HashMap::new(),
			idf: HashMap::new(),
			avg_doc_len: 0.0,
			indexed: false,
		}
	}

	pub fn params(&self) -> Bm25Params { self.params }

	/// Build the index from scratch.
	///
	/// An empty corpus leaves a valid, empty index behind (searches return
	/// nothing) but is still reported as `EmptyCorpus`.
	#[instrument(skip_all)]
	pub fn build_index<'a, I>(&mut self, documents: I) -> Result<()>
	where
		I: IntoIterator<Item = &'a Chunk>,
	{
		self.ids.clear();
		self.doc_lens.clear();
		self.postings.clear();
		self.idf.clear();
		self.avg_doc_len = 0.0;
		self.indexed = true;

		for (position, doc) in documents.into_iter().enumerate() {
			let terms = self.analyzer.analyze(&doc.text);
			self.doc_lens.push(terms.len());
			self.ids.push(doc.id.clone());
			let mut term_freqs: HashMap<String, u32> = HashMap::new();
			for term in terms { *term_freqs.entry(term).or_insert(0) += 1; }
			for (term, tf) in term_freqs { self.postings.entry(term).or_default().push((position, tf)); }
		}

		let total_docs = self.ids.len();
		if total_docs == 0 { return Err(Error::EmptyCorpus); }

		self.avg_doc_len = self.doc_lens.iter().sum::<usize>() as f64 / total_docs as f64;
		let n = total_docs as f64;
		for (term, list) in &self.postings {
			let df = list.len() as f64;
			let ratio = (n - df + 0.5) / (df + 0.5);
			let idf = match self.params.idf {
				IdfVariant::Canonical => ratio.ln(),
				IdfVariant::Smoothed => ratio.ln_1p(),
			};
			self.idf.insert(term.clone(), idf);
		}

		info!(documents = total_docs, avg_doc_len = self.avg_doc_len, unique_terms = self.postings.len(), "BM25 index built");
		Ok(())
	}

	pub fn is_indexed(&self) -> bool { self.indexed }

	pub fn len(&self) -> usize { self.ids.len() }

	pub fn is_empty(&self) -> bool { self.ids.is_empty() }

	pub fn stats(&self) -> Option<IndexStats> {
		self.indexed.then(|| IndexStats { documents: self.ids.len(), avg_doc_len: self.avg_doc_len, unique_terms: self.postings.len() })
	}

	/// Number of documents containing `term` at least once.
	pub fn doc_freq(&self, term: &str) -> usize {
		self.postings.get(term).map_or(0, Vec::len)
	}

	pub fn idf(&self, term: &str) -> Option<f64> { self.idf.get(term).copied() }

	/// Every document containing at least one query term, ranked by BM25
	/// score (highest first, ties in document order).
	///
	/// Under canonical IDF a document can match and still score ≤ 0.
	pub fn match_terms(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
		if !self.indexed { return Err(Error::NotIndexed); }
		let query_terms = self.analyzer.analyze(query);
		if query_terms.is_empty() || limit == 0 || self.ids.is_empty() { return Ok(Vec::new()); }

		let mut scores: HashMap<usize, f64> = HashMap::new();
		for term in &query_terms {
			let (Some(list), Some(&idf)) = (self.postings.get(term), self.idf.get(term)) else { continue };
			for &(position, tf) in list {
				*scores.entry(position).or_insert(0.0) += idf * self.term_weight(f64::from(tf), self.doc_lens[position]);
			}
		}

		let mut ranked: Vec<(usize, f64)> = scores.into_iter().collect();
		ranked.sort_unstable_by_key(|(position, _)| *position);
		ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
		ranked.truncate(limit);
		debug!(query, terms = query_terms.len(), hits = ranked.len(), "BM25 match");

		Ok(ranked
			.into_iter()
			.map(|(index, score)| SearchHit { id: self.ids[index].clone(), index, score: score as f32, source: SourceKind::Text })
			.collect())
	}

	/// Documents with a strictly positive BM25 score, best first.
	pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
		let mut hits = self.match_terms(query, usize::MAX)?;
		hits.retain(|h| h.score > 0.0);
		hits.truncate(limit);
		Ok(hits)
	}

	fn term_weight(&self, tf: f64, doc_len: usize) -> f64 {
		let Bm25Params { k1, b, .. } = self.params;
		let length_ratio = if self.avg_doc_len > 0.0 { doc_len as f64 / self.avg_doc_len } else { 1.0 };
		(tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio))
	}
}

impl Default for LexicalIndex {
	fn default() -> Self { Self::new(Bm25Params::default()) }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn corpus(texts: &[&str]) -> Vec<Chunk> {
		texts.iter().enumerate().map(|(i, t)| Chunk::new(format!("c{i}"), *t)).collect()
	}

	#[test]
	fn canonical_idf_goes_negative_for_majority_terms() {
		let docs = corpus(&["refund policy", "refund timelines", "password reset"]);
		let mut index = LexicalIndex::default();
		index.build_index(&docs).unwrap();
		assert_eq!(index.doc_freq("refund"), 2);
		let idf = index.idf("refund").unwrap();
		assert!((idf - (1.5f64 / 2.5).ln()).abs() < 1e-12);
		assert!(idf < 0.0);
		assert!(index.idf("password").unwrap() > 0.0);
	}

	#[test]
	fn stats_reflect_filtered_terms() {
		let docs = corpus(&["the refund policy", "a password reset for you"]);
		let mut index = LexicalIndex::default();
		index.build_index(&docs).unwrap();
		let stats = index.stats().unwrap();
		assert_eq!(stats.documents, 2);
		// "refund policy" (2) and "password reset" (2)
		assert!((stats.avg_doc_len - 2.0).abs() < 1e-12);
		assert_eq!(stats.unique_terms, 4);
	}

	#[test]
	fn empty_corpus_is_reported_but_searchable() {
		let mut index = LexicalIndex::default();
		let err = index.build_index(&Vec::<Chunk>::new()).unwrap_err();
		assert!(matches!(err, Error::EmptyCorpus));
		assert!(index.search("anything", 5).unwrap().is_empty());
	}
}
