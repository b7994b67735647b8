use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompts::{answer_prompt, NO_CONTEXT_ANSWER, SYSTEM_MEDICAL_ASSISTANT};
use super::providers::{Provider, ResolvedProvider};
use crate::error::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

/// Multi-provider generation client
pub struct LlmClient {
    provider: Provider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(resolved: &ResolvedProvider) -> Self {
        Self {
            provider: resolved.provider,
            endpoint: resolved.endpoint.trim_end_matches('/').to_string(),
            model: resolved.model.clone(),
            api_key: resolved.api_key.clone(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer `question` grounded on the retrieved passages. With no passages
    /// the model is not called.
    pub async fn answer(&self, question: &str, contexts: &[String]) -> Result<Answer> {
        if contexts.is_empty() {
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
            });
        }
        debug!(provider = %self.provider, passages = contexts.len(), "generating answer");
        let text = self
            .chat(SYSTEM_MEDICAL_ASSISTANT, &answer_prompt(question, contexts))
            .await?;
        Ok(Answer {
            answer: text.trim().to_string(),
        })
    }

    /// Send a chat completion request and return the response text
    pub async fn chat(&self, system: &str, user: &str) -> Result<String> {
        match self.provider {
            Provider::Anthropic => self.chat_anthropic(system, user).await,
            Provider::OpenAI | Provider::Ollama | Provider::Gemini => {
                self.chat_openai_compat(system, user).await
            }
        }
    }

    /// Anthropic Messages API
    async fn chat_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.endpoint);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system,
            "messages": [
                { "role": "user", "content": user },
            ],
            "temperature": 0.2,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req
                .header("x-api-key", key)
                .header("anthropic-version", "2023-06-01");
        }

        let json = send(req).await?;
        json.get("content")
            .and_then(|c| c.get(0))
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or(RagError::LlmEmptyResponse)
    }

    /// OpenAI-compatible API (OpenAI, Ollama, Gemini)
    async fn chat_openai_compat(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.2,
            "max_tokens": 1024,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let json = send(req).await?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or(RagError::LlmEmptyResponse)
    }
}

async fn send(req: reqwest::RequestBuilder) -> Result<serde_json::Value> {
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(RagError::Llm(format!("{}: {}", status, text)));
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_context_skips_the_model() {
        // Unroutable endpoint: any request would fail
        let client = LlmClient::new(&ResolvedProvider {
            provider: Provider::Ollama,
            endpoint: "http://127.0.0.1:9/v1/".into(),
            model: "test".into(),
            api_key: None,
        });
        let answer = client.answer("What is asthma?", &[]).await.unwrap();
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert_eq!(client.model(), "test");
    }
}
