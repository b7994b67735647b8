use std::path::PathBuf;

use super::{rank, IndexRecord, Metric, QueryResult, RecordSet, VectorIndex};
use crate::error::Result;

/// Exact brute-force inner-product index. Every query scores every
/// committed record.
#[derive(Debug, Default)]
pub struct FlatIndex {
    records: RecordSet,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist committed records to `path` on every flush.
    pub fn with_storage(self, path: PathBuf) -> Self {
        Self {
            records: RecordSet::with_storage(path),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn create(&mut self, dimension: usize, metric: Metric) -> Result<()> {
        self.records.create(dimension, metric)
    }

    fn drop_index(&mut self) {
        self.records.reset();
    }

    fn insert(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        self.records.insert(records)
    }

    fn flush(&mut self) -> Result<()> {
        self.records.flush()
    }

    fn load(&mut self) -> Result<()> {
        self.records.mark_loaded()
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        if !self.records.check_query(query, top_k)? {
            return Ok(Vec::new());
        }
        Ok(rank(self.records.committed().iter(), query, top_k))
    }

    fn is_ready(&self) -> bool {
        self.records.is_ready()
    }

    fn len(&self) -> usize {
        self.records.committed().len()
    }

    fn dimension(&self) -> Option<usize> {
        self.records.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::l2_normalize;
    use crate::error::RagError;
    use crate::index::test_support::{five_records, record};

    fn loaded(records: Vec<IndexRecord>) -> FlatIndex {
        let mut index = FlatIndex::new();
        index.create(3, Metric::InnerProduct).unwrap();
        index.insert(records).unwrap();
        index.flush().unwrap();
        index.load().unwrap();
        index
    }

    #[test]
    fn test_top_k_three_of_five_with_tie() {
        let index = loaded(five_records());
        let query = l2_normalize(vec![1.0, 0.1, 0.0]).unwrap();
        let results = index.search(&query, 3).unwrap();
        assert_eq!(results.len(), 3);
        let ids: Vec<u64> = results.iter().map(|r| r.chunk_id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert!(results
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score));
    }

    #[test]
    fn test_top_k_larger_than_index() {
        let index = loaded(five_records());
        let results = index.search(&[0.0, 0.0, 1.0], 50).unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].chunk_id, 2);
    }

    #[test]
    fn test_empty_index_returns_no_results() {
        let mut index = FlatIndex::new();
        index.create(3, Metric::InnerProduct).unwrap();
        index.flush().unwrap();
        index.load().unwrap();
        assert!(!index.is_ready());
        assert!(index.search(&[1.0, 0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_unloaded_records_are_invisible() {
        let mut index = FlatIndex::new();
        index.create(3, Metric::InnerProduct).unwrap();
        index.insert(five_records()).unwrap();
        index.flush().unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 3).unwrap().is_empty());
        index.load().unwrap();
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 3).unwrap().len(), 3);
    }

    #[test]
    fn test_query_dimension_must_match() {
        let index = loaded(five_records());
        assert!(matches!(
            index.search(&[1.0, 0.0], 3),
            Err(RagError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_search_is_idempotent() {
        let index = loaded(five_records());
        let query = l2_normalize(vec![0.3, 0.3, 0.9]).unwrap();
        let first = index.search(&query, 4).unwrap();
        let second = index.search(&query, 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_self_similarity_is_maximal() {
        let index = loaded(five_records());
        for target in five_records() {
            let results = index.search(&target.embedding, 5).unwrap();
            let own = results.iter().find(|r| r.chunk_id == target.chunk_id).unwrap();
            for other in results.iter().filter(|r| r.text != target.text) {
                assert!(own.similarity_score >= other.similarity_score);
            }
        }
    }

    #[test]
    fn test_flush_writes_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let mut index = FlatIndex::new().with_storage(path.clone());
        index.create(3, Metric::InnerProduct).unwrap();
        index.insert(vec![record(0, "stored", vec![1.0, 0.0, 0.0])]).unwrap();
        assert!(!path.exists(), "staged records are not durable");
        index.flush().unwrap();
        let saved = crate::index::store::load_records(&path).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].text, "stored");
    }

    #[test]
    fn test_drop_starts_new_generation() {
        let mut index = loaded(five_records());
        index.drop_index();
        assert_eq!(index.dimension(), None);
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(RagError::IndexNotInitialized)
        ));
        index.create(3, Metric::InnerProduct).unwrap();
        assert_eq!(index.insert(five_records()).unwrap(), 5);
    }
}
