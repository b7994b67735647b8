use std::collections::BTreeMap;
use std::path::Path;

use super::IndexRecord;
use crate::chunking::ChunkStats;
use crate::error::{RagError, Result};

/// Read a chunk file: a JSON array of records.
pub fn load_records(path: &Path) -> Result<Vec<IndexRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<IndexRecord> = serde_json::from_str(&content)?;
    Ok(records)
}

/// Write a chunk file. The content goes to a sibling temp file first and is
/// renamed into place, so readers never see a half-written file.
pub fn save_records(path: &Path, records: &[IndexRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| RagError::Config(format!("invalid chunk file path: {}", path.display())))?;
    let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

    let json = serde_json::to_string(records)?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Summary of a chunk file.
pub struct StoreStats {
    pub lengths: ChunkStats,
    pub dimension: Option<usize>,
    pub by_document: BTreeMap<String, usize>,
    pub file_bytes: u64,
}

pub fn stats(path: &Path) -> Result<StoreStats> {
    let records = load_records(path)?;
    let file_bytes = std::fs::metadata(path)?.len();

    let mut by_document = BTreeMap::new();
    for record in &records {
        let doc = record
            .document_id
            .clone()
            .unwrap_or_else(|| "(unknown)".to_string());
        *by_document.entry(doc).or_insert(0) += 1;
    }

    Ok(StoreStats {
        lengths: ChunkStats::from_lengths(records.iter().map(|r| r.length)),
        dimension: records.first().map(|r| r.embedding.len()),
        by_document,
        file_bytes,
    })
}
