use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chunking::DEFAULT_MIN_PARAGRAPH_LEN;
use crate::error::{RagError, Result};
use crate::index::{IndexKind, IvfParams};
use crate::llm::providers::{resolve_provider, ResolvedProvider};

/// Name of the optional config file inside the data directory
pub const CONFIG_FILE: &str = "medrag.json";
/// Chunk file written by `build`, read by every query command
pub const CHUNKS_FILE: &str = "chunks.json";
/// Build manifest, recording encoder identity and chunking parameters
pub const MANIFEST_FILE: &str = "manifest.json";

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub overlap: usize,
    pub min_paragraph_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 600,
            overlap: 80,
            min_paragraph_len: DEFAULT_MIN_PARAGRAPH_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Hashing,
    OpenAI,
    Gemini,
    Ollama,
}

impl EmbeddingBackend {
    pub fn default_model(&self) -> &'static str {
        match self {
            EmbeddingBackend::Hashing => "hashing-v1",
            EmbeddingBackend::OpenAI => "text-embedding-3-small",
            EmbeddingBackend::Gemini => "text-embedding-004",
            EmbeddingBackend::Ollama => "nomic-embed-text",
        }
    }

    pub fn default_dimension(&self) -> usize {
        match self {
            EmbeddingBackend::Hashing => crate::embeddings::EMBEDDING_DIM,
            EmbeddingBackend::OpenAI => 1536,
            EmbeddingBackend::Gemini | EmbeddingBackend::Ollama => 768,
        }
    }

    pub fn from_str_loose(s: &str) -> Option<EmbeddingBackend> {
        match s.to_lowercase().as_str() {
            "hashing" | "local" | "offline" => Some(EmbeddingBackend::Hashing),
            "openai" => Some(EmbeddingBackend::OpenAI),
            "gemini" | "google" => Some(EmbeddingBackend::Gemini),
            "ollama" => Some(EmbeddingBackend::Ollama),
            _ => None,
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingBackend::Hashing => write!(f, "hashing"),
            EmbeddingBackend::OpenAI => write!(f, "openai"),
            EmbeddingBackend::Gemini => write!(f, "gemini"),
            EmbeddingBackend::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: Option<String>,
    pub dimension: Option<usize>,
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            model: None,
            dimension: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub ivf: IvfParams,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::Flat,
            ivf: IvfParams::default(),
        }
    }
}

/// Unresolved LLM settings; resolved (and API keys looked up) only by
/// commands that actually generate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

/// Optional overrides read from `medrag.json`. Every field may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub max_chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub min_paragraph_len: Option<usize>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dimension: Option<usize>,
    pub embedding_endpoint: Option<String>,
    pub index: Option<String>,
    pub nlist: Option<usize>,
    pub nprobe: Option<usize>,
    pub seed: Option<u64>,
    pub top_k: Option<usize>,
    pub llm_provider: Option<String>,
    pub llm_endpoint: Option<String>,
    pub llm_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Where chunk files, manifests and the config file live
    pub data_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub llm: LlmConfig,
    pub top_k: usize,
}

/// Command-line settings layered over the file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub index: Option<String>,
    pub max_chunk_size: Option<usize>,
    pub overlap: Option<usize>,
}

impl Config {
    /// Defaults, then `<data_dir>/medrag.json`, then `MEDRAG_*` environment
    /// variables, then command-line overrides. Validated once, at the end.
    pub fn load(data_dir_override: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::resolve(data_dir_override, |key| std::env::var(key).ok(), overrides)
    }

    pub fn resolve(
        data_dir_override: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let data_dir = match (data_dir_override, env("MEDRAG_DATA_DIR")) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => PathBuf::from(shellexpand::tilde(&dir).into_owned()),
            (None, None) => dirs::home_dir()
                .ok_or_else(|| RagError::Config("Could not determine home directory".into()))?
                .join(".medrag"),
        };

        let mut config = Config::with_data_dir(data_dir);

        let file_path = config.data_dir.join(CONFIG_FILE);
        if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
                RagError::Config(format!("{}: {}", file_path.display(), e))
            })?;
            config.apply_file(file)?;
        }

        config.apply_env(&env)?;
        config.apply_overrides(overrides)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            llm: LlmConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    fn apply_file(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(v) = file.max_chunk_size {
            self.chunking.max_chunk_size = v;
        }
        if let Some(v) = file.overlap {
            self.chunking.overlap = v;
        }
        if let Some(v) = file.min_paragraph_len {
            self.chunking.min_paragraph_len = v;
        }
        if let Some(v) = file.embedding_provider {
            self.embedding.backend = parse_backend(&v)?;
        }
        if file.embedding_model.is_some() {
            self.embedding.model = file.embedding_model;
        }
        if file.embedding_dimension.is_some() {
            self.embedding.dimension = file.embedding_dimension;
        }
        if file.embedding_endpoint.is_some() {
            self.embedding.endpoint = file.embedding_endpoint;
        }
        if let Some(v) = file.index {
            self.index.kind = parse_index_kind(&v)?;
        }
        if let Some(v) = file.nlist {
            self.index.ivf.nlist = v;
        }
        if let Some(v) = file.nprobe {
            self.index.ivf.nprobe = v;
        }
        if let Some(v) = file.seed {
            self.index.ivf.seed = v;
        }
        if let Some(v) = file.top_k {
            self.top_k = v;
        }
        if file.llm_provider.is_some() {
            self.llm.provider = file.llm_provider;
        }
        if file.llm_endpoint.is_some() {
            self.llm.endpoint = file.llm_endpoint;
        }
        if file.llm_model.is_some() {
            self.llm.model = file.llm_model;
        }
        Ok(())
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = env("MEDRAG_EMBED_PROVIDER") {
            self.embedding.backend = parse_backend(&v)?;
        }
        if let Some(v) = env("MEDRAG_EMBED_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Some(v) = env_parse(env, "MEDRAG_EMBED_DIM")? {
            self.embedding.dimension = Some(v);
        }
        if let Some(v) = env("MEDRAG_EMBED_ENDPOINT") {
            self.embedding.endpoint = Some(v);
        }
        if let Some(v) = env("MEDRAG_INDEX") {
            self.index.kind = parse_index_kind(&v)?;
        }
        if let Some(v) = env_parse(env, "MEDRAG_NLIST")? {
            self.index.ivf.nlist = v;
        }
        if let Some(v) = env_parse(env, "MEDRAG_NPROBE")? {
            self.index.ivf.nprobe = v;
        }
        if let Some(v) = env("MEDRAG_LLM_PROVIDER") {
            self.llm.provider = Some(v);
        }
        if let Some(v) = env("MEDRAG_LLM_ENDPOINT") {
            self.llm.endpoint = Some(v);
        }
        if let Some(v) = env("MEDRAG_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(v) = &overrides.index {
            self.index.kind = parse_index_kind(v)?;
        }
        if let Some(v) = overrides.max_chunk_size {
            self.chunking.max_chunk_size = v;
        }
        if let Some(v) = overrides.overlap {
            self.chunking.overlap = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.max_chunk_size == 0 {
            return Err(RagError::Config("max_chunk_size must be positive".into()));
        }
        if c.overlap >= c.max_chunk_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be smaller than max_chunk_size ({})",
                c.overlap, c.max_chunk_size
            )));
        }
        if self.embedding.dimension == Some(0) {
            return Err(RagError::Config("embedding dimension must be positive".into()));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidTopK(0));
        }
        self.index.ivf.validate()
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.data_dir.join(CHUNKS_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join(MANIFEST_FILE)
    }

    /// Resolve the generation provider, looking up its API key.
    pub fn resolve_llm(&self, provider_override: Option<&str>) -> Result<ResolvedProvider> {
        resolve_provider(
            provider_override.or(self.llm.provider.as_deref()),
            self.llm.endpoint.clone(),
            self.llm.model.clone(),
        )
    }
}

fn parse_backend(value: &str) -> Result<EmbeddingBackend> {
    EmbeddingBackend::from_str_loose(value)
        .ok_or_else(|| RagError::Config(format!("Unknown embedding provider: {}", value)))
}

fn parse_index_kind(value: &str) -> Result<IndexKind> {
    IndexKind::from_str_loose(value)
        .ok_or_else(|| RagError::Config(format!("Unknown index kind: {}", value)))
}

fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RagError::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_overrides() -> Overrides {
        Overrides::default()
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::resolve(Some(dir.path()), env_from(&[]), &no_overrides()).unwrap();
        assert_eq!(config.chunking, ChunkingConfig::default());
        assert_eq!(config.chunking.max_chunk_size, 600);
        assert_eq!(config.chunking.overlap, 80);
        assert_eq!(config.embedding.backend, EmbeddingBackend::Hashing);
        assert_eq!(config.index.kind, IndexKind::Flat);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert_eq!(config.chunks_path(), dir.path().join(CHUNKS_FILE));
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"max_chunk_size": 400, "overlap": 40, "index": "ivf", "nprobe": 8}"#,
        )
        .unwrap();
        let env = env_from(&[("MEDRAG_NPROBE", "16"), ("MEDRAG_EMBED_PROVIDER", "ollama")]);
        let config = Config::resolve(Some(dir.path()), env, &no_overrides()).unwrap();
        assert_eq!(config.chunking.max_chunk_size, 400);
        assert_eq!(config.chunking.overlap, 40);
        assert_eq!(config.index.kind, IndexKind::Ivf);
        assert_eq!(config.index.ivf.nprobe, 16);
        assert_eq!(config.embedding.backend, EmbeddingBackend::Ollama);
    }

    #[test]
    fn test_data_dir_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let env = env_from(&[("MEDRAG_DATA_DIR", path.as_str())]);
        let config = Config::resolve(None, env, &no_overrides()).unwrap();
        assert_eq!(config.data_dir, dir.path());
    }

    #[test]
    fn test_rejects_overlap_not_below_max() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"max_chunk_size": 100, "overlap": 100}"#,
        )
        .unwrap();
        assert!(matches!(
            Config::resolve(Some(dir.path()), env_from(&[]), &no_overrides()),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_overrides_fix_invalid_file_pair() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"max_chunk_size": 100, "overlap": 100}"#,
        )
        .unwrap();
        let overrides = Overrides {
            overlap: Some(20),
            index: Some("ivf".into()),
            ..Overrides::default()
        };
        let config = Config::resolve(Some(dir.path()), env_from(&[]), &overrides).unwrap();
        assert_eq!(config.chunking.max_chunk_size, 100);
        assert_eq!(config.chunking.overlap, 20);
        assert_eq!(config.index.kind, IndexKind::Ivf);

        let bad = Overrides {
            max_chunk_size: Some(10),
            overlap: Some(10),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::resolve(Some(dir.path()), env_from(&[]), &bad),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_bad_env_values() {
        let dir = tempfile::tempdir().unwrap();
        for (key, value) in [
            ("MEDRAG_NLIST", "many"),
            ("MEDRAG_INDEX", "hnsw"),
            ("MEDRAG_NPROBE", "0"),
        ] {
            let env = env_from(&[(key, value)]);
            assert!(Config::resolve(Some(dir.path()), env, &no_overrides()).is_err());
        }
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!(EmbeddingBackend::from_str_loose("LOCAL"), Some(EmbeddingBackend::Hashing));
        assert_eq!(EmbeddingBackend::from_str_loose("bert"), None);
        assert_eq!(EmbeddingBackend::OpenAI.to_string(), "openai");
    }
}
