use std::collections::HashSet;

use proptest::prelude::*;
use quarry_core::error::Error;
use quarry_core::types::Chunk;
use quarry_vector::{cosine_similarity, VectorStore};

fn store(vectors: &[Vec<f32>]) -> VectorStore {
    let mut s = VectorStore::new();
    s.load(vectors.iter().enumerate().map(|(i, v)| (Chunk::new(format!("c{i}"), format!("text {i}")), v.clone())))
        .expect("load");
    s
}

#[test]
fn search_before_load_is_not_indexed() {
    let s = VectorStore::new();
    assert!(matches!(s.search(&[1.0, 0.0], None, 3), Err(Error::NotIndexed)));
}

#[test]
fn self_similarity_and_negation() {
    let v = vec![0.3f32, -1.2, 2.5, 0.7];
    let neg: Vec<f32> = v.iter().map(|x| -x).collect();
    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    assert!((cosine_similarity(&v, &neg) + 1.0).abs() < 1e-6);

    let s = store(&[neg.clone(), v.clone()]);
    let hits = s.search(&v, None, 2).unwrap();
    assert_eq!(hits[0].id, "c1");
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!((hits[1].score + 1.0).abs() < 1e-6);
}

#[test]
fn zero_vector_scores_zero() {
    let s = store(&[vec![0.0, 0.0], vec![1.0, 0.0]]);
    let hits = s.search(&[0.0, 0.0], None, 5).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.score == 0.0));
    // ties keep load order
    assert_eq!(hits[0].id, "c0");
}

#[test]
fn ranks_by_similarity() {
    let s = store(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]]);
    let hits = s.search(&[1.0, 0.1], None, 2).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(hits[0].index, 1);
}

#[test]
fn inconsistent_dimensions_fail_the_load() {
    let mut s = store(&[vec![1.0, 0.0]]);
    let err = s
        .load(vec![(Chunk::new("a", "x"), vec![1.0, 0.0, 0.0]), (Chunk::new("b", "y"), vec![1.0, 0.0])])
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2, .. }));
    // previous contents survive
    assert_eq!(s.len(), 1);
    assert_eq!(s.dim(), 2);
}

#[test]
fn query_dimension_must_match() {
    let s = store(&[vec![1.0, 0.0]]);
    assert!(matches!(s.search(&[1.0, 0.0, 0.0], None, 1), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn subset_restricts_candidates() {
    let s = store(&[vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]]);
    let subset: HashSet<String> = ["c2".to_string()].into_iter().collect();
    let hits = s.search(&[1.0, 0.0], Some(&subset), 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "c2");

    let empty = HashSet::new();
    assert!(s.search(&[1.0, 0.0], Some(&empty), 5).unwrap().is_empty());
}

#[test]
fn lookup_by_id() {
    let s = store(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
    let (chunk, emb) = s.get("c1").unwrap();
    assert_eq!(chunk.text, "text 1");
    assert_eq!(emb, &vec![0.0, 1.0]);
    assert!(s.get("missing").is_none());
}

proptest! {
    #[test]
    fn similarity_is_bounded_and_symmetric(
        a in prop::collection::vec(-10.0f32..10.0, 8),
        b in prop::collection::vec(-10.0f32..10.0, 8),
    ) {
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        prop_assert!((-1.0..=1.0).contains(&ab));
        prop_assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn results_are_sorted(vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 1..20)) {
        let s = store(&vectors);
        let hits = s.search(&[0.5, -0.5, 0.25, 1.0], None, 50).unwrap();
        prop_assert_eq!(hits.len(), vectors.len());
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}
