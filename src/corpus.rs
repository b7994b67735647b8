//! Corpus adapter: turns the accepted input shapes into documents.
//!
//! Accepted inputs:
//! - a plain `.txt`/`.md` file (one document, id = file stem)
//! - JSON object with a string `context` (one document; other keys are metadata)
//! - JSON object mapping id to text, or to `{"text"|"content": ...}`
//! - JSON array of strings, or of objects with `text`/`content` and optional `id`
//! - a directory, walked recursively for the files above

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{RagError, Result};

const CORPUS_EXTENSIONS: &[&str] = &["json", "txt", "md"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

/// Documents plus the files they came from and the items that were skipped.
#[derive(Debug, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub sources: Vec<PathBuf>,
    pub skipped: usize,
}

pub fn load_documents(path: &Path) -> Result<Corpus> {
    if !path.exists() {
        return Err(RagError::Corpus(format!("{} does not exist", path.display())));
    }

    let files = if path.is_dir() {
        corpus_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut corpus = Corpus::default();
    for file in files {
        let (docs, skipped) = load_file(&file)?;
        debug!(file = %file.display(), documents = docs.len(), skipped, "loaded corpus file");
        corpus.documents.extend(docs);
        corpus.skipped += skipped;
        corpus.sources.push(file);
    }
    Ok(corpus)
}

fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| CORPUS_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn load_file(path: &Path) -> Result<(Vec<Document>, usize)> {
    let content = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());

    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if !is_json {
        return Ok((vec![Document { id: stem, text: content }], 0));
    }

    let value: Value = serde_json::from_str(&content)
        .map_err(|e| RagError::Corpus(format!("{}: {}", path.display(), e)))?;
    parse_json(&stem, value)
        .map_err(|e| RagError::Corpus(format!("{}: {}", path.display(), e)))
}

/// Map a parsed JSON value onto documents. Items without text are counted as
/// skipped; a value of any other shape is an error.
pub fn parse_json(stem: &str, value: Value) -> std::result::Result<(Vec<Document>, usize), String> {
    let mut docs = Vec::new();
    let mut skipped = 0;

    match value {
        Value::Object(map) if map.get("context").is_some_and(Value::is_string) => {
            if let Some(Value::String(text)) = map.get("context") {
                docs.push(Document {
                    id: stem.to_string(),
                    text: text.clone(),
                });
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                match item_text(&item) {
                    Some(text) => docs.push(Document { id: key, text }),
                    None => {
                        warn!(id = %key, "corpus item has no text; skipping");
                        skipped += 1;
                    }
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                let id = item
                    .get("id")
                    .and_then(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .unwrap_or_else(|| format!("{}#{}", stem, i));
                match item_text(&item) {
                    Some(text) => docs.push(Document { id, text }),
                    None => {
                        warn!(id = %id, "corpus item has no text; skipping");
                        skipped += 1;
                    }
                }
            }
        }
        other => {
            return Err(format!(
                "unsupported corpus shape (top-level {})",
                json_kind(&other)
            ))
        }
    }

    Ok((docs, skipped))
}

fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
