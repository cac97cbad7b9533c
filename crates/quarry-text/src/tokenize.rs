use std::collections::HashSet;
use std::sync::OnceLock;

use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};

/// English function words dropped before indexing and querying.
pub const STOP_WORDS: &[&str] = &[
	"the","a","an","and","or","but","in","on","at","to","for","of","with","by",
	"is","are","was","were","be","been","have","has","had","do","does","did",
	"will","would","could","should","may","might","can","what","how","when",
	"where","why","who","this","that","these","those","i","you","he","she",
	"it","we","they","me","him","her","us","them","my","your","his",
	"its","our","their","mine","yours","hers","ours","theirs",
];

/// Lowercasing tokenizer plus a stop-word filter.
///
/// Text is split on every non-alphanumeric character (punctuation and
/// whitespace alike), lowercased, and empty tokens never appear. Stateless
/// apart from the immutable analyzer chain, so one instance can be shared.
#[derive(Clone)]
pub struct Analyzer {
	analyzer: TextAnalyzer,
	stop_words: HashSet<&'static str>,
}

impl Analyzer {
	pub fn new() -> Self {
		let analyzer = TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build();
		Self { analyzer, stop_words: STOP_WORDS.iter().copied().collect() }
	}

	pub fn tokenize(&self, text: &str) -> Vec<String> {
		// token_stream needs &mut; the clone is a few boxed pointers.
		let mut analyzer = self.analyzer.clone();
		let mut stream = analyzer.token_stream(text);
		let mut tokens = Vec::new();
		while stream.advance() {
			let token = &stream.token().text;
			if !token.is_empty() { tokens.push(token.clone()); }
		}
		tokens
	}

	pub fn remove_stop_words(&self, tokens: Vec<String>) -> Vec<String> {
		tokens.into_iter().filter(|t| !self.is_stop_word(t)).collect()
	}

	pub fn is_stop_word(&self, token: &str) -> bool {
		self.stop_words.contains(token)
	}

	/// `tokenize` followed by `remove_stop_words`.
	pub fn analyze(&self, text: &str) -> Vec<String> {
		self.remove_stop_words(self.tokenize(text))
	}
}

impl Default for Analyzer {
	fn default() -> Self { Self::new() }
}

fn shared() -> &'static Analyzer {
	static ANALYZER: OnceLock<Analyzer> = OnceLock::new();
	ANALYZER.get_or_init(Analyzer::new)
}

pub fn tokenize(text: &str) -> Vec<String> { shared().tokenize(text) }

pub fn remove_stop_words(tokens: Vec<String>) -> Vec<String> { shared().remove_stop_words(tokens) }
