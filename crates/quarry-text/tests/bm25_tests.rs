use proptest::prelude::*;

use quarry_core::config::IdfVariant;
use quarry_core::error::Error;
use quarry_core::types::Chunk;
use quarry_text::{Bm25Params, LexicalIndex};

fn corpus(texts: &[&str]) -> Vec<Chunk> {
    texts.iter().enumerate().map(|(i, t)| Chunk::new(format!("doc:{i}"), *t)).collect()
}

fn built(texts: &[&str], params: Bm25Params) -> LexicalIndex {
    let mut index = LexicalIndex::new(params);
    index.build_index(&corpus(texts)).expect("build");
    index
}

const SUPPORT_DOCS: &[&str] = &[
    "Setting up webhooks for your server lets bots post messages",
    "Roles and permissions control who can moderate a channel",
    "Voice channels need the connect and speak permissions",
    "Moderation bots can ban users and keep audit logs",
    "Creating a bot requires a token from the developer portal",
    "Webhook payloads are JSON and webhook URLs must stay secret",
];

#[test]
fn search_before_build_is_not_indexed() {
    let index = LexicalIndex::default();
    assert!(matches!(index.search("anything", 3), Err(Error::NotIndexed)));
    assert!(matches!(index.match_terms("anything", 3), Err(Error::NotIndexed)));
}

#[test]
fn empty_and_stop_word_queries_return_nothing() {
    let index = built(SUPPORT_DOCS, Bm25Params::default());
    assert!(index.search("", 10).unwrap().is_empty());
    assert!(index.search("   ", 10).unwrap().is_empty());
    assert!(index.search("the and of", 10).unwrap().is_empty());
}

#[test]
fn rare_term_ranks_its_document_first() {
    let index = built(SUPPORT_DOCS, Bm25Params::default());
    let hits = index.search("webhook", 10).unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "doc:5");
    assert!(hits.iter().all(|h| h.score > 0.0));
}

#[test]
fn results_carry_chunk_ids_and_positions() {
    let index = built(SUPPORT_DOCS, Bm25Params::default());
    for hit in index.search("permissions voice", 10).unwrap() {
        assert_eq!(hit.id, format!("doc:{}", hit.index));
    }
}

#[test]
fn ties_keep_document_order() {
    let index = built(&["alpha beta", "gamma delta", "alpha beta", "epsilon zeta", "eta theta"], Bm25Params::default());
    let hits = index.search("alpha", 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].score, hits[1].score);
    assert_eq!((hits[0].index, hits[1].index), (0, 2));
}

#[test]
fn single_document_matches_its_own_text() {
    let text = "reset a forgotten password";
    // Canonical IDF is negative when every document holds the term, so the
    // document is still the top term match but does not pass the > 0 cut.
    let canonical = built(&[text], Bm25Params::default());
    let matches = canonical.match_terms(text, 5).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "doc:0");
    assert!(matches[0].score < 0.0);
    assert!(canonical.search(text, 5).unwrap().is_empty());

    let smoothed = built(&[text], Bm25Params { idf: IdfVariant::Smoothed, ..Bm25Params::default() });
    let hits = smoothed.search(text, 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "doc:0");
    assert!(hits[0].score > 0.0);
}

#[test]
fn score_matches_hand_computed_formula() {
    let index = built(&["refund refund policy", "password reset", "merchant accounts", "login help"], Bm25Params::default());
    let hits = index.search("refund", 5).unwrap();
    assert_eq!(hits.len(), 1);

    let (n, df, tf, k1, b) = (4.0f64, 1.0f64, 2.0f64, 1.2f64, 0.75f64);
    let avg = (3.0 + 2.0 + 2.0 + 2.0) / 4.0;
    let idf = ((n - df + 0.5) / (df + 0.5)).ln();
    let expected = idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * (3.0 / avg)));
    assert!((f64::from(hits[0].score) - expected).abs() < 1e-5);
}

#[test]
fn rebuild_replaces_previous_statistics() {
    let mut index = built(&["alpha", "beta"], Bm25Params::default());
    index.build_index(&corpus(&["gamma", "gamma delta", "epsilon"])).unwrap();
    assert_eq!(index.len(), 3);
    assert!(index.idf("alpha").is_none());
    assert_eq!(index.doc_freq("gamma"), 2);
}

proptest! {
    #[test]
    fn scores_are_non_increasing_and_idempotent(
        docs in prop::collection::vec("[a-e]{1,3}( [a-e]{1,3}){0,6}", 1..12),
        query in "[a-e]{1,3}( [a-e]{1,3}){0,2}",
    ) {
        let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
        let index = built(&refs, Bm25Params::default());
        let first = index.match_terms(&query, 20).unwrap();
        for pair in first.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        let second = index.match_terms(&query, 20).unwrap();
        prop_assert_eq!(first, second);

        let positive = index.search(&query, 20).unwrap();
        prop_assert!(positive.iter().all(|h| h.score > 0.0));
    }
}
