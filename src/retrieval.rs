use std::fmt;

use tracing::{debug, info};

use crate::chunking::Chunk;
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::index::{new_index, store, IndexRecord, Metric, QueryResult, VectorIndex};
use crate::manifest::BuildManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Index created, records may be staged; queries are refused
    Initialized,
    Ready,
    TornDown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Initialized => write!(f, "initialized"),
            ServiceState::Ready => write!(f, "ready"),
            ServiceState::TornDown => write!(f, "torn down"),
        }
    }
}

/// Query-time facade over one encoder and one index.
///
/// The same encoder embeds both chunks and queries. Queries are refused
/// until [`RetrievalService::ready`] has flushed and loaded the index, and
/// again after [`RetrievalService::teardown`].
pub struct RetrievalService<E: Embedder> {
    embedder: E,
    index: Box<dyn VectorIndex>,
    state: ServiceState,
}

impl<E: Embedder> RetrievalService<E> {
    /// Take ownership of the encoder and index. An uncreated index is created
    /// with the encoder's dimension; an existing one must already match it.
    pub fn init(embedder: E, mut index: Box<dyn VectorIndex>) -> Result<Self> {
        let dimension = embedder.dimension();
        match index.dimension() {
            None => index.create(dimension, Metric::InnerProduct)?,
            Some(existing) if existing != dimension => {
                return Err(RagError::DimensionMismatch {
                    expected: existing,
                    actual: dimension,
                })
            }
            Some(_) => {}
        }
        debug!(model = embedder.model_id(), dimension, "retrieval service initialized");
        Ok(Self {
            embedder,
            index,
            state: ServiceState::Initialized,
        })
    }

    /// Restore a service from the chunk file written by a previous build.
    pub fn open(config: &Config, embedder: E) -> Result<Self> {
        let chunks_path = config.chunks_path();
        if !chunks_path.exists() {
            return Err(RagError::Config(format!(
                "No index at {}. Run `medrag build <corpus>` first.",
                chunks_path.display()
            )));
        }
        if let Some(manifest) = BuildManifest::load(&config.manifest_path())? {
            manifest.check_encoder(embedder.model_id(), embedder.dimension())?;
        }

        let records = store::load_records(&chunks_path)?;
        let index = new_index(config.index.kind, config.index.ivf, None);
        let mut service = Self::init(embedder, index)?;
        service.index_records(records)?;
        service.ready()?;
        info!(
            records = service.len(),
            index = %config.index.kind,
            "opened index from {}",
            chunks_path.display()
        );
        Ok(service)
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Committed record count.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Stage embedded chunks. Fails on the first chunk without an embedding,
    /// before anything is inserted.
    pub fn index_chunks(&mut self, chunks: Vec<Chunk>) -> Result<usize> {
        let records = chunks
            .into_iter()
            .map(IndexRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        self.index_records(records)
    }

    pub fn index_records(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        let inserted = self.index.insert(records)?;
        if self.state == ServiceState::Ready {
            self.state = ServiceState::Initialized;
        }
        Ok(inserted)
    }

    /// Flush staged records and load the index for searching.
    pub fn ready(&mut self) -> Result<()> {
        if self.state == ServiceState::TornDown {
            return Err(RagError::IndexNotInitialized);
        }
        self.index.flush()?;
        self.index.load()?;
        self.state = ServiceState::Ready;
        Ok(())
    }

    /// Encode `query` and return the `top_k` most similar chunks.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        if self.state != ServiceState::Ready {
            return Err(RagError::IndexNotReady);
        }
        if top_k == 0 {
            return Err(RagError::InvalidTopK(top_k));
        }
        let vector = self.embedder.encode_one(query).await?;
        let results = self.index.search(&vector, top_k)?;
        debug!(top_k, hits = results.len(), "retrieved chunks");
        Ok(results)
    }

    pub async fn search_similar_chunks(&self, query: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        self.retrieve(query, top_k).await
    }

    /// Ranked hits backing an answer: at most `top_n`, none with empty text.
    pub async fn sources_for(&self, question: &str, top_n: usize) -> Result<Vec<QueryResult>> {
        let results = self.retrieve(question, top_n).await?;
        Ok(results
            .into_iter()
            .filter(|r| !r.text.trim().is_empty())
            .take(top_n)
            .collect())
    }

    /// Chunk texts handed to the generator, in rank order.
    pub async fn context_for(&self, question: &str, top_n: usize) -> Result<Vec<String>> {
        let sources = self.sources_for(question, top_n).await?;
        Ok(sources.into_iter().map(|r| r.text).collect())
    }

    /// Drop the index. The service refuses every later query.
    pub fn teardown(&mut self) {
        self.index.drop_index();
        self.state = ServiceState::TornDown;
        debug!("retrieval service torn down");
    }
}
