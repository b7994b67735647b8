use serde::Deserialize;
use tracing::debug;

use super::{finish_batch, Embedder, HashingEmbedder};
use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{RagError, Result};

/// Runtime-selected encoder. Remote variants call an HTTP embedding API;
/// `Hashing` runs locally.
pub enum EmbeddingProvider {
    OpenAI {
        api_key: String,
        model: String,
        dimension: usize,
        model_id: String,
    },
    Gemini {
        api_key: String,
        model: String,
        dimension: usize,
        model_id: String,
    },
    Ollama {
        endpoint: String,
        model: String,
        dimension: usize,
        model_id: String,
    },
    Hashing(HashingEmbedder),
}

impl EmbeddingProvider {
    /// Build the provider named by the config. Missing API keys are fatal
    /// here, before anything is indexed.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let backend = config.backend;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| backend.default_model().to_string());
        let dimension = config.dimension.unwrap_or(backend.default_dimension());
        let model_id = format!("{}/{}", backend, model);

        match backend {
            EmbeddingBackend::OpenAI => {
                let api_key = std::env::var("OPENAI_API_KEY")
                    .map_err(|_| RagError::Config("OPENAI_API_KEY not set".into()))?;
                Ok(Self::OpenAI {
                    api_key,
                    model,
                    dimension,
                    model_id,
                })
            }
            EmbeddingBackend::Gemini => {
                let api_key = std::env::var("GEMINI_API_KEY")
                    .map_err(|_| RagError::Config("GEMINI_API_KEY not set".into()))?;
                Ok(Self::Gemini {
                    api_key,
                    model,
                    dimension,
                    model_id,
                })
            }
            EmbeddingBackend::Ollama => Ok(Self::Ollama {
                endpoint: config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                model,
                dimension,
                model_id,
            }),
            EmbeddingBackend::Hashing => {
                if model != backend.default_model() {
                    return Err(RagError::Config(format!(
                        "hashing backend has a single model ({}); got '{}'",
                        backend.default_model(),
                        model
                    )));
                }
                Ok(Self::Hashing(HashingEmbedder::new(dimension)?))
            }
        }
    }

    async fn embed_openai(
        &self,
        texts: &[String],
        api_key: &str,
        model: &str,
    ) -> Result<Vec<Vec<f32>>> {
        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let client = reqwest::Client::new();
        let response = client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({
                "model": model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("OpenAI API error: {}", text)));
        }

        let mut result: EmbeddingResponse = response.json().await?;
        result.data.sort_by_key(|d| d.index);
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_gemini(
        &self,
        texts: &[String],
        api_key: &str,
        model: &str,
    ) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::new();
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let response = client
                .post(format!(
                    "https://generativelanguage.googleapis.com/v1/models/{}:embedContent?key={}",
                    model, api_key
                ))
                .json(&serde_json::json!({
                    "content": {
                        "parts": [{
                            "text": text
                        }]
                    }
                }))
                .send()
                .await?;

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(RagError::Embedding(format!("Gemini API error: {}", text)));
            }

            let result: serde_json::Value = response.json().await?;
            embeddings.push(parse_values(
                result.get("embedding").and_then(|e| e.get("values")),
                "Gemini",
            )?);
        }

        Ok(embeddings)
    }

    async fn embed_ollama(
        &self,
        texts: &[String],
        endpoint: &str,
        model: &str,
    ) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::new();
        let url = format!("{}/api/embeddings", endpoint.trim_end_matches('/'));
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let response = client
                .post(&url)
                .json(&serde_json::json!({
                    "model": model,
                    "prompt": text,
                }))
                .send()
                .await?;

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(RagError::Embedding(format!("Ollama API error: {}", text)));
            }

            let result: serde_json::Value = response.json().await?;
            embeddings.push(parse_values(result.get("embedding"), "Ollama")?);
        }

        Ok(embeddings)
    }
}

fn parse_values(values: Option<&serde_json::Value>, provider: &str) -> Result<Vec<f32>> {
    Ok(values
        .and_then(|v| v.as_array())
        .ok_or_else(|| RagError::Embedding(format!("Invalid {} embedding response", provider)))?
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect())
}

impl Embedder for EmbeddingProvider {
    fn model_id(&self) -> &str {
        match self {
            Self::OpenAI { model_id, .. }
            | Self::Gemini { model_id, .. }
            | Self::Ollama { model_id, .. } => model_id,
            Self::Hashing(h) => h.model_id(),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            Self::OpenAI { dimension, .. }
            | Self::Gemini { dimension, .. }
            | Self::Ollama { dimension, .. } => *dimension,
            Self::Hashing(h) => h.dimension(),
        }
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = self.model_id(), count = texts.len(), "encoding batch");
        let raw = match self {
            Self::OpenAI { api_key, model, .. } => self.embed_openai(texts, api_key, model).await?,
            Self::Gemini { api_key, model, .. } => self.embed_gemini(texts, api_key, model).await?,
            Self::Ollama {
                endpoint, model, ..
            } => self.embed_ollama(texts, endpoint, model).await?,
            Self::Hashing(h) => return h.encode(texts).await,
        };
        finish_batch(raw, texts.len(), self.dimension())
    }
}
