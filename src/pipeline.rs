//! Corpus -> embedded index records.
//!
//! Each document is normalized, segmented into paragraphs and packed into
//! chunks. Chunk ids keep counting across documents. Documents that yield no
//! paragraphs are logged and skipped; they never abort the build.

use tracing::{info, warn};

use crate::chunking::{normalize, segment, Chunk, ChunkBuilder, ChunkStats};
use crate::config::ChunkingConfig;
use crate::corpus::Document;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::index::IndexRecord;

/// Texts sent to the encoder per request.
pub const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct ChunkedDocument {
    pub document_id: String,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Default)]
pub struct ChunkedCorpus {
    pub documents: Vec<ChunkedDocument>,
    /// Ids of documents that produced no paragraphs
    pub skipped: Vec<String>,
}

impl ChunkedCorpus {
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|d| d.chunks.len()).sum()
    }

    pub fn stats(&self) -> ChunkStats {
        ChunkStats::from_lengths(
            self.documents
                .iter()
                .flat_map(|d| d.chunks.iter().map(|c| c.length)),
        )
    }
}

/// Normalize, segment and chunk one document.
pub fn chunk_document(
    document: &Document,
    builder: &ChunkBuilder,
    min_paragraph_len: usize,
) -> Result<Vec<Chunk>> {
    let paragraphs = segment(&normalize(&document.text), min_paragraph_len);
    if paragraphs.is_empty() {
        return Err(RagError::NoParagraphs(document.id.clone()));
    }
    Ok(builder.build(&paragraphs))
}

pub fn chunk_corpus(documents: &[Document], config: &ChunkingConfig) -> Result<ChunkedCorpus> {
    let base = ChunkBuilder::new(config.max_chunk_size, config.overlap)?;
    let mut corpus = ChunkedCorpus::default();
    let mut next_id = 0u64;

    for document in documents {
        let builder = base.starting_at(next_id);
        match chunk_document(document, &builder, config.min_paragraph_len) {
            Ok(chunks) => {
                next_id += chunks.len() as u64;
                corpus.documents.push(ChunkedDocument {
                    document_id: document.id.clone(),
                    chunks,
                });
            }
            Err(e @ RagError::NoParagraphs(_)) => {
                warn!("{}; skipping", e);
                corpus.skipped.push(document.id.clone());
            }
            Err(e) => return Err(e),
        }
    }

    let stats = corpus.stats();
    info!(
        documents = corpus.documents.len(),
        skipped = corpus.skipped.len(),
        chunks = stats.count,
        min_len = stats.min_len,
        max_len = stats.max_len,
        mean_len = stats.mean_len,
        "chunked corpus"
    );
    Ok(corpus)
}

/// Encode every chunk and turn it into an index record carrying its
/// document id. `on_batch` is called with the number of chunks finished.
pub async fn embed_corpus<E: Embedder>(
    embedder: &E,
    corpus: ChunkedCorpus,
    mut on_batch: impl FnMut(usize),
) -> Result<Vec<IndexRecord>> {
    let tagged: Vec<(String, Chunk)> = corpus
        .documents
        .into_iter()
        .flat_map(|doc| {
            let id = doc.document_id;
            doc.chunks.into_iter().map(move |c| (id.clone(), c))
        })
        .collect();

    let mut records = Vec::with_capacity(tagged.len());
    let mut iter = tagged.into_iter().peekable();
    while iter.peek().is_some() {
        let batch: Vec<(String, Chunk)> = iter.by_ref().take(EMBED_BATCH_SIZE).collect();
        let texts: Vec<String> = batch.iter().map(|(_, c)| c.text.clone()).collect();
        let vectors = embedder.encode(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "encoder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let done = batch.len();
        for ((document_id, chunk), vector) in batch.into_iter().zip(vectors) {
            let mut record = IndexRecord::try_from(chunk.with_embedding(vector)?)?;
            record.document_id = Some(document_id);
            records.push(record);
        }
        on_batch(done);
    }

    info!(records = records.len(), model = embedder.model_id(), "embedded chunks");
    Ok(records)
}
