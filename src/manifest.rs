use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::index::IndexKind;

/// What a chunk file was built from and with which encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub model_id: String,
    pub dimension: usize,
    pub chunking: ChunkingConfig,
    pub index: IndexKind,
    pub chunk_count: usize,
    /// Source file path -> SHA-256 of its content at build time
    pub sources: BTreeMap<String, String>,
    pub built_at: DateTime<Utc>,
}

impl BuildManifest {
    pub fn new(model_id: &str, dimension: usize, chunking: ChunkingConfig, index: IndexKind) -> Self {
        Self {
            model_id: model_id.to_string(),
            dimension,
            chunking,
            index,
            chunk_count: 0,
            sources: BTreeMap::new(),
            built_at: Utc::now(),
        }
    }

    /// Load the manifest, or `None` if no build has been recorded yet
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Record a source file with its current hash
    pub fn record_source(&mut self, path: &Path) -> Result<()> {
        let hash = hash_file(path)?;
        self.sources.insert(path.to_string_lossy().to_string(), hash);
        Ok(())
    }

    /// True when `sources` are exactly the recorded files, all unchanged,
    /// and the build settings match.
    pub fn is_up_to_date(&self, other: &BuildManifest) -> bool {
        self.model_id == other.model_id
            && self.dimension == other.dimension
            && self.chunking == other.chunking
            && self.index == other.index
            && self.sources == other.sources
    }

    /// Queries must be encoded by the encoder the chunks were built with.
    pub fn check_encoder(&self, model_id: &str, dimension: usize) -> Result<()> {
        if self.model_id != model_id || self.dimension != dimension {
            return Err(RagError::EncoderMismatch {
                built: format!("{} ({}d)", self.model_id, self.dimension),
                current: format!("{} ({}d)", model_id, dimension),
            });
        }
        Ok(())
    }
}

/// Compute SHA-256 hash of a file
fn hash_file(path: &Path) -> Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
