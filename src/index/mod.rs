//! Vector index over chunk embeddings.
//!
//! Two interchangeable backends sit behind [`VectorIndex`]: [`FlatIndex`]
//! (exact) and [`IvfIndex`] (clustered, approximate). Both share the same
//! record lifecycle: `insert` stages records, `flush` commits them, `load`
//! makes committed records searchable.

pub mod flat;
pub mod ivf;
pub mod store;

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::{char_len, Chunk, SourceParagraphs};
use crate::embeddings::{inner_product, l2_norm, NORM_TOLERANCE};
use crate::error::{RagError, Result};

pub use flat::FlatIndex;
pub use ivf::{IvfIndex, IvfParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    /// Inner product over unit vectors, i.e. cosine similarity.
    InnerProduct,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::InnerProduct => write!(f, "inner-product"),
        }
    }
}

/// Persisted projection of a chunk, one per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub chunk_id: u64,
    pub text: String,
    pub length: usize,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_paragraphs: Option<SourceParagraphs>,
}

impl TryFrom<Chunk> for IndexRecord {
    type Error = RagError;

    fn try_from(chunk: Chunk) -> Result<Self> {
        let (chunk_id, text, length, source, embedding) = chunk.into_parts();
        let embedding = embedding.ok_or(RagError::MissingEmbedding(chunk_id))?;
        Ok(IndexRecord {
            chunk_id,
            text,
            length,
            embedding,
            document_id: None,
            source_paragraphs: Some(source),
        })
    }
}

/// One ranked hit. `distance` is `1 - similarity_score`, for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk_id: u64,
    pub text: String,
    pub length: usize,
    pub similarity_score: f32,
    pub distance: f32,
}

impl QueryResult {
    fn from_record(record: &IndexRecord, score: f32) -> Self {
        Self {
            chunk_id: record.chunk_id,
            text: record.text.clone(),
            length: record.length,
            similarity_score: score,
            distance: 1.0 - score,
        }
    }
}

/// Lifecycle and search contract shared by every index backend.
pub trait VectorIndex: Send + Sync {
    /// Initialize an empty index. Fails if already created.
    fn create(&mut self, dimension: usize, metric: Metric) -> Result<()>;

    /// Forget everything, including the id generation.
    fn drop_index(&mut self);

    /// Stage a batch. Either every record is accepted or none is.
    fn insert(&mut self, records: Vec<IndexRecord>) -> Result<usize>;

    /// Commit staged records (and write them out if the index has storage).
    fn flush(&mut self) -> Result<()>;

    /// Build search structures over committed records.
    fn load(&mut self) -> Result<()>;

    /// At most `top_k` hits, by descending score then ascending chunk id.
    /// Empty when nothing is loaded.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>>;

    fn is_ready(&self) -> bool;

    /// Committed record count.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> Option<usize>;
}

/// Backend selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Flat,
    Ivf,
}

impl IndexKind {
    pub fn from_str_loose(s: &str) -> Option<IndexKind> {
        match s.to_lowercase().as_str() {
            "flat" | "exact" | "brute-force" => Some(IndexKind::Flat),
            "ivf" | "ivf-flat" | "ivf_flat" => Some(IndexKind::Ivf),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "flat"),
            IndexKind::Ivf => write!(f, "ivf"),
        }
    }
}

/// Build an empty, uncreated index of the requested kind.
pub fn new_index(kind: IndexKind, params: IvfParams, storage: Option<PathBuf>) -> Box<dyn VectorIndex> {
    match kind {
        IndexKind::Flat => {
            let mut index = FlatIndex::new();
            if let Some(path) = storage {
                index = index.with_storage(path);
            }
            Box::new(index)
        }
        IndexKind::Ivf => {
            let mut index = IvfIndex::new(params);
            if let Some(path) = storage {
                index = index.with_storage(path);
            }
            Box::new(index)
        }
    }
}

/// Record bookkeeping shared by both backends: staging, commit, id
/// uniqueness and the loaded flag.
#[derive(Debug, Default)]
pub(crate) struct RecordSet {
    dimension: Option<usize>,
    pending: Vec<IndexRecord>,
    committed: Vec<IndexRecord>,
    ids: HashSet<u64>,
    loaded: bool,
    storage: Option<PathBuf>,
}

impl RecordSet {
    pub(crate) fn with_storage(storage: PathBuf) -> Self {
        Self {
            storage: Some(storage),
            ..Default::default()
        }
    }

    pub(crate) fn create(&mut self, dimension: usize, _metric: Metric) -> Result<()> {
        if let Some(existing) = self.dimension {
            return Err(RagError::IndexAlreadyInitialized(existing));
        }
        if dimension == 0 {
            return Err(RagError::Config("index dimension must be positive".into()));
        }
        self.dimension = Some(dimension);
        debug!(dimension, "index created");
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        let storage = self.storage.take();
        *self = Self {
            storage,
            ..Default::default()
        };
    }

    pub(crate) fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub(crate) fn committed(&self) -> &[IndexRecord] {
        &self.committed
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.loaded && !self.committed.is_empty()
    }

    fn validate(&self, records: &[IndexRecord]) -> Result<()> {
        let dimension = self.dimension.ok_or(RagError::IndexNotInitialized)?;
        let mut batch_ids = HashSet::with_capacity(records.len());

        for record in records {
            if record.embedding.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: record.embedding.len(),
                });
            }
            if record.text.is_empty() {
                return Err(RagError::InvalidRecord {
                    chunk_id: record.chunk_id,
                    reason: "empty text".into(),
                });
            }
            if record.length != char_len(&record.text) {
                return Err(RagError::InvalidRecord {
                    chunk_id: record.chunk_id,
                    reason: format!(
                        "length {} does not match text length {}",
                        record.length,
                        char_len(&record.text)
                    ),
                });
            }
            if record.embedding.iter().any(|x| !x.is_finite()) {
                return Err(RagError::InvalidRecord {
                    chunk_id: record.chunk_id,
                    reason: "embedding has non-finite values".into(),
                });
            }
            let norm = l2_norm(&record.embedding);
            if (norm - 1.0).abs() > NORM_TOLERANCE {
                return Err(RagError::NotNormalized {
                    chunk_id: record.chunk_id,
                    norm,
                });
            }
            if self.ids.contains(&record.chunk_id) || !batch_ids.insert(record.chunk_id) {
                return Err(RagError::DuplicateChunkId(record.chunk_id));
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        self.validate(&records)?;
        let count = records.len();
        self.ids.extend(records.iter().map(|r| r.chunk_id));
        self.pending.extend(records);
        if count > 0 {
            self.loaded = false;
        }
        debug!(count, pending = self.pending.len(), "records staged");
        Ok(count)
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.dimension.is_none() {
            return Err(RagError::IndexNotInitialized);
        }
        let staged = self.pending.len();
        let before = self.committed.len();
        self.committed.append(&mut self.pending);
        if let Some(path) = &self.storage {
            // Staged records stay pending unless they reach disk
            if let Err(e) = store::save_records(path, &self.committed) {
                self.pending = self.committed.split_off(before);
                return Err(e);
            }
            info!(
                records = self.committed.len(),
                path = %path.display(),
                "index flushed to disk"
            );
        } else {
            debug!(staged, committed = self.committed.len(), "index flushed");
        }
        Ok(())
    }

    pub(crate) fn mark_loaded(&mut self) -> Result<()> {
        if self.dimension.is_none() {
            return Err(RagError::IndexNotInitialized);
        }
        self.loaded = true;
        Ok(())
    }

    /// Validate a query. `Ok(false)` means "search nothing, return empty".
    pub(crate) fn check_query(&self, query: &[f32], top_k: usize) -> Result<bool> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK(top_k));
        }
        let dimension = self.dimension.ok_or(RagError::IndexNotInitialized)?;
        if query.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }
        Ok(self.is_ready())
    }
}

/// Exact scoring of `candidates`, best first, ties by ascending chunk id.
pub(crate) fn rank<'a>(
    candidates: impl Iterator<Item = &'a IndexRecord>,
    query: &[f32],
    top_k: usize,
) -> Vec<QueryResult> {
    let mut scored: Vec<(f32, &IndexRecord)> = candidates
        .map(|record| (inner_product(query, &record.embedding), record))
        .collect();

    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
    });
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(score, record)| QueryResult::from_record(record, score))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::IndexRecord;
    use crate::embeddings::l2_normalize;

    pub fn record(chunk_id: u64, text: &str, embedding: Vec<f32>) -> IndexRecord {
        IndexRecord {
            chunk_id,
            text: text.to_string(),
            length: text.chars().count(),
            embedding: l2_normalize(embedding).unwrap(),
            document_id: None,
            source_paragraphs: None,
        }
    }

    /// Five records with known directions in 3-d; 1 and 3 are identical.
    pub fn five_records() -> Vec<IndexRecord> {
        vec![
            record(0, "zero", vec![0.0, 1.0, 0.0]),
            record(1, "one", vec![1.0, 0.2, 0.0]),
            record(2, "two", vec![0.0, 0.0, 1.0]),
            record(3, "three", vec![1.0, 0.2, 0.0]),
            record(4, "four", vec![1.0, 1.0, 0.0]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::embeddings::l2_normalize;

    fn created() -> RecordSet {
        let mut set = RecordSet::default();
        set.create(3, Metric::InnerProduct).unwrap();
        set
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let records = five_records();
        let query = l2_normalize(vec![1.0, 0.0, 0.0]).unwrap();
        let results = rank(records.iter(), &query, 3);
        let ids: Vec<u64> = results.iter().map(|r| r.chunk_id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(results[0].similarity_score, results[1].similarity_score);
        assert!(results[1].similarity_score > results[2].similarity_score);
        for r in &results {
            assert!((r.distance - (1.0 - r.similarity_score)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_create_twice_fails() {
        let mut set = created();
        assert!(matches!(
            set.create(3, Metric::InnerProduct),
            Err(RagError::IndexAlreadyInitialized(3))
        ));
        set.reset();
        assert!(set.create(8, Metric::InnerProduct).is_ok());
    }

    #[test]
    fn test_insert_requires_create() {
        let mut set = RecordSet::default();
        assert!(matches!(
            set.insert(five_records()),
            Err(RagError::IndexNotInitialized)
        ));
    }

    #[test]
    fn test_bad_record_aborts_whole_batch() {
        let mut set = created();
        let mut batch = five_records();
        batch.push(IndexRecord {
            embedding: vec![1.0, 0.0],
            ..record(9, "short", vec![1.0, 0.0, 0.0])
        });
        assert!(matches!(
            set.insert(batch),
            Err(RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        set.flush().unwrap();
        assert!(set.committed().is_empty());
        // ids from the rejected batch are still free
        assert_eq!(set.insert(five_records()).unwrap(), 5);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut set = created();
        set.insert(five_records()).unwrap();
        let again = vec![record(2, "dup", vec![0.0, 1.0, 1.0])];
        assert!(matches!(set.insert(again), Err(RagError::DuplicateChunkId(2))));

        let within = vec![
            record(10, "a", vec![1.0, 0.0, 0.0]),
            record(10, "b", vec![0.0, 1.0, 0.0]),
        ];
        assert!(matches!(set.insert(within), Err(RagError::DuplicateChunkId(10))));
    }

    #[test]
    fn test_unnormalized_embedding_rejected() {
        let mut set = created();
        let raw = IndexRecord {
            embedding: vec![2.0, 0.0, 0.0],
            ..record(0, "raw", vec![1.0, 0.0, 0.0])
        };
        assert!(matches!(set.insert(vec![raw]), Err(RagError::NotNormalized { .. })));
    }

    #[test]
    fn test_length_must_match_text() {
        let mut set = created();
        let wrong = IndexRecord {
            length: 99,
            ..record(0, "text", vec![1.0, 0.0, 0.0])
        };
        assert!(matches!(set.insert(vec![wrong]), Err(RagError::InvalidRecord { .. })));
    }

    #[test]
    fn test_ready_only_after_load_of_committed_records() {
        let mut set = created();
        set.mark_loaded().unwrap();
        assert!(!set.is_ready(), "empty index is never ready");

        set.insert(five_records()).unwrap();
        assert!(!set.is_ready());
        set.flush().unwrap();
        assert!(!set.is_ready());
        set.mark_loaded().unwrap();
        assert!(set.is_ready());

        set.insert(vec![record(7, "late", vec![0.0, 1.0, 1.0])]).unwrap();
        assert!(!set.is_ready(), "insert invalidates the loaded state");
    }

    #[test]
    fn test_failed_write_keeps_records_pending() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let mut set = RecordSet::with_storage(blocker.join("chunks.json"));
        set.create(3, Metric::InnerProduct).unwrap();
        set.insert(five_records()).unwrap();
        assert!(set.flush().is_err());
        assert!(set.committed().is_empty());
        assert_eq!(set.pending.len(), 5);

        let path = dir.path().join("chunks.json");
        set.storage = Some(path.clone());
        set.flush().unwrap();
        assert_eq!(set.committed().len(), 5);
        assert!(set.pending.is_empty());
        assert_eq!(store::load_records(&path).unwrap().len(), 5);
    }

    #[test]
    fn test_check_query() {
        let set = created();
        assert!(matches!(set.check_query(&[1.0, 0.0, 0.0], 0), Err(RagError::InvalidTopK(0))));
        assert!(matches!(
            set.check_query(&[1.0, 0.0], 1),
            Err(RagError::DimensionMismatch { .. })
        ));
        assert!(!set.check_query(&[1.0, 0.0, 0.0], 1).unwrap());
        assert!(matches!(
            RecordSet::default().check_query(&[1.0], 1),
            Err(RagError::IndexNotInitialized)
        ));
    }

    #[test]
    fn test_record_from_chunk_needs_embedding() {
        let source = SourceParagraphs {
            start: 0,
            end: 0,
            partial: false,
        };
        let chunk = Chunk::new(4, "bare".into(), source);
        assert!(matches!(
            IndexRecord::try_from(chunk.clone()),
            Err(RagError::MissingEmbedding(4))
        ));
        let record = IndexRecord::try_from(chunk.with_embedding(vec![1.0]).unwrap()).unwrap();
        assert_eq!(record.chunk_id, 4);
        assert_eq!(record.source_paragraphs, Some(source));
    }

    #[test]
    fn test_index_kind_parsing() {
        assert_eq!(IndexKind::from_str_loose("IVF_FLAT"), Some(IndexKind::Ivf));
        assert_eq!(IndexKind::from_str_loose("exact"), Some(IndexKind::Flat));
        assert_eq!(IndexKind::from_str_loose("hnsw"), None);
    }
}
