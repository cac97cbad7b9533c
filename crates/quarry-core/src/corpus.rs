//! Corpus loading from JSON chunk dumps.
//!
//! Accepts a single `.json` file holding an array of chunk records, or a
//! directory whose `.json` files (sorted by path) each hold such an array.
//! Metadata is normalised here, once: category defaults to `general`, tags
//! default to empty, numbers and booleans are kept as strings.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Error;
use crate::traits::CorpusSource;
use crate::types::{Chunk, ChunkMetadata, Embedding, MetaValue, GENERAL_CATEGORY};

/// A chunk as read from disk, with its pre-computed embedding if the dump
/// carried one.
#[derive(Debug, Clone)]
pub struct CorpusRecord {
    pub chunk: Chunk,
    pub embedding: Option<Embedding>,
}

const RESERVED_KEYS: &[&str] = &["id", "content", "text", "pageContent", "embedding", "metadata"];

pub struct JsonCorpus {
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record, validating ids across all files.
    pub fn load_records(&self) -> Result<Vec<CorpusRecord>> {
        let files = if self.path.is_dir() { self.list_json_files(&self.path) } else { vec![self.path.clone()] };
        let mut records = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "loading corpus file {}/{}", file_index + 1, files.len());
            let raw = fs::read_to_string(file_path).with_context(|| format!("reading {}", file_path.display()))?;
            let value: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", file_path.display()))?;
            let items = match value {
                Value::Array(items) => items,
                _ => return Err(Error::InvalidCorpus(format!("{} does not hold a JSON array", file_path.display())).into()),
            };
            for (i, item) in items.into_iter().enumerate() {
                records.push(parse_record(item, file_path, i)?);
            }
        }
        validate_ids(records.iter().map(|r| &r.chunk))?;
        info!(files = files.len(), chunks = records.len(), "corpus loaded from {}", self.path.display());
        Ok(records)
    }

    fn list_json_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut json_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        json_files.sort();
        json_files
    }
}

impl CorpusSource for JsonCorpus {
    fn load_corpus(&self) -> Result<Vec<Chunk>> {
        Ok(self.load_records()?.into_iter().map(|r| r.chunk).collect())
    }
}

/// Reject blank and duplicate ids; they would break the id join in fusion.
pub fn validate_ids<'a, I>(chunks: I) -> std::result::Result<(), Error>
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let mut seen = HashSet::new();
    for chunk in chunks {
        if chunk.id.trim().is_empty() {
            return Err(Error::InvalidCorpus("chunk with blank id".to_string()));
        }
        if !seen.insert(chunk.id.as_str()) {
            return Err(Error::InvalidCorpus(format!("duplicate chunk id '{}'", chunk.id)));
        }
    }
    Ok(())
}

fn parse_record(item: Value, file: &Path, position: usize) -> Result<CorpusRecord> {
    let Value::Object(mut obj) = item else {
        return Err(Error::InvalidCorpus(format!("{} entry {} is not an object", file.display(), position)).into());
    };
    let id = match obj.remove("id") {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(Error::InvalidCorpus(format!("{} entry {} has no id", file.display(), position)).into()),
    };
    let text = ["content", "text", "pageContent"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();
    let embedding = match obj.remove("embedding") {
        Some(v @ Value::Array(_)) => Some(serde_json::from_value::<Embedding>(v).with_context(|| format!("embedding of '{id}'"))?),
        _ => None,
    };
    let mut fields = match obj.remove("metadata") {
        Some(Value::Object(m)) => m,
        _ => Map::new(),
    };
    for (k, v) in obj {
        if !RESERVED_KEYS.contains(&k.as_str()) {
            fields.entry(k).or_insert(v);
        }
    }
    let metadata = metadata_from_fields(fields);
    Ok(CorpusRecord { chunk: Chunk { id, text, metadata }, embedding })
}

fn metadata_from_fields(fields: Map<String, Value>) -> ChunkMetadata {
    let mut meta = ChunkMetadata::default();
    for (key, value) in fields {
        match key.as_str() {
            "category" => {
                if let Some(c) = scalar(&value).filter(|c| !c.trim().is_empty()) {
                    meta.category = c;
                }
            }
            "tags" => meta.tags = list(&value).into_iter().collect(),
            "source" => meta.source = scalar(&value).unwrap_or_default(),
            _ => {
                let v = match &value {
                    Value::Array(_) => MetaValue::List(list(&value)),
                    other => match scalar(other) {
                        Some(s) => MetaValue::Text(s),
                        None => continue,
                    },
                };
                meta.extra.insert(key, v);
            }
        }
    }
    if meta.category.is_empty() {
        meta.category = GENERAL_CATEGORY.to_string();
    }
    meta
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}
