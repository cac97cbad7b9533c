//! quarry-text
//!
//! Text normalisation and an in-memory BM25 index. Tokenization reuses
//! Tantivy's analyzer chain; scoring statistics are computed here so the
//! IDF form and tie-breaking are fully under our control.

pub mod bm25;
pub mod tokenize;

pub use bm25::{Bm25Params, IndexStats, LexicalIndex};
pub use tokenize::{remove_stop_words, tokenize, Analyzer, STOP_WORDS};
