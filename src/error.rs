use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config error: {0}")]
    Config(String),

    // ── Index / encoder configuration ───────────────────────────────────
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid top_k: {0} (must be >= 1)")]
    InvalidTopK(usize),

    #[error("Index has not been created")]
    IndexNotInitialized,

    #[error("Index already created (dimension {0}); drop it first")]
    IndexAlreadyInitialized(usize),

    #[error("Index is not ready; build and load it before querying")]
    IndexNotReady,

    #[error("Encoder mismatch: index was built with {built} but the query encoder is {current}")]
    EncoderMismatch { built: String, current: String },

    // ── Data errors ─────────────────────────────────────────────────────
    #[error("Chunk {0} has no embedding")]
    MissingEmbedding(u64),

    #[error("Chunk {0} already has an embedding")]
    EmbeddingAlreadyAttached(u64),

    #[error("Duplicate chunk id {0}")]
    DuplicateChunkId(u64),

    #[error("Embedding for chunk {chunk_id} is not unit-normalized (norm {norm:.4})")]
    NotNormalized { chunk_id: u64, norm: f32 },

    #[error("Invalid record {chunk_id}: {reason}")]
    InvalidRecord { chunk_id: u64, reason: String },

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Question set error: {0}")]
    Questions(String),

    #[error("Document '{0}' produced no paragraphs above the minimum length")]
    NoParagraphs(String),

    // ── Unavailable dependencies ────────────────────────────────────────
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("LLM returned empty response")]
    LlmEmptyResponse,
}

pub type Result<T> = std::result::Result<T, RagError>;
