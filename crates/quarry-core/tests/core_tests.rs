use std::fs;
use tempfile::TempDir;

use quarry_core::config::{Config, IdfVariant};
use quarry_core::corpus::JsonCorpus;
use quarry_core::traits::CorpusSource;
use quarry_core::types::{MetaValue, Normalization};

#[test]
fn load_single_file_with_nested_and_flat_metadata() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("chunks.json");
    fs::write(
        &path,
        r#"[
            {"id": "a", "content": "Refund policy", "metadata": {"category": "billing", "tags": ["refunds"], "source": "faq.md", "chunkIndex": 0}},
            {"id": 7, "text": "Reset your password", "category": "account", "tags": "security"},
            {"id": "c", "pageContent": "Untagged note"}
        ]"#,
    )
    .unwrap();

    let chunks = JsonCorpus::new(&path).load_corpus().expect("load");
    assert_eq!(chunks.len(), 3);

    assert_eq!(chunks[0].metadata.category, "billing");
    assert!(chunks[0].metadata.tags.contains("refunds"));
    assert_eq!(chunks[0].metadata.source, "faq.md");
    assert_eq!(chunks[0].metadata.extra.get("chunkIndex"), Some(&MetaValue::Text("0".to_string())));

    assert_eq!(chunks[1].id, "7");
    assert_eq!(chunks[1].text, "Reset your password");
    assert_eq!(chunks[1].metadata.category, "account");
    assert!(chunks[1].metadata.tags.contains("security"));

    // Missing category falls back to general, missing tags to empty.
    assert!(chunks[2].metadata.is_general());
    assert!(chunks[2].metadata.tags.is_empty());
}

#[test]
fn load_directory_keeps_embeddings_in_path_order() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("b.json"), r#"[{"id": "b1", "content": "second", "embedding": [0.0, 1.0]}]"#).unwrap();
    fs::write(tmp.path().join("a.json"), r#"[{"id": "a1", "content": "first", "embedding": [1.0, 0.0]}]"#).unwrap();
    fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

    let records = JsonCorpus::new(tmp.path()).load_records().expect("load dir");
    let ids: Vec<_> = records.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "b1"]);
    assert_eq!(records[0].embedding.as_deref(), Some(&[1.0f32, 0.0][..]));
}

#[test]
fn duplicate_ids_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dup.json");
    fs::write(&path, r#"[{"id": "x", "content": "one"}, {"id": "x", "content": "two"}]"#).unwrap();

    let err = JsonCorpus::new(&path).load_corpus().unwrap_err();
    assert!(err.to_string().contains("duplicate chunk id"), "got: {err}");
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(
        &path,
        r#"
[bm25]
k1 = 1.5
idf = "smoothed"

[fusion]
alpha = 0.7
beta = 0.3
normalization = "softmax"

[[intent.labels]]
name = "billing"
exemplar = "questions about refunds, invoices and charges"
categories = ["billing", "general"]
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).expect("config");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.bm25.k1, 1.5);
    assert_eq!(settings.bm25.b, 0.75, "untouched keys keep defaults");
    assert_eq!(settings.bm25.idf, IdfVariant::Smoothed);
    assert_eq!(settings.fusion.normalization, Normalization::Softmax);
    assert_eq!(settings.intent.labels.len(), 1);
    assert_eq!(settings.intent.labels[0].categories, vec!["billing", "general"]);

    let alpha: f32 = config.get("fusion.alpha").expect("typed get");
    assert!((alpha - 0.7).abs() < 1e-6);
}

#[test]
fn invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(&path, "[bm25]\nb = 2.0\n").unwrap();
    assert!(Config::from_file(&path).is_err());
}
