// Library interface for medrag

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod llm;
pub mod manifest;
pub mod pipeline;
pub mod questions;
pub mod retrieval;

// Re-export commonly used types
pub use config::Config;
pub use error::{RagError, Result};
pub use retrieval::RetrievalService;
