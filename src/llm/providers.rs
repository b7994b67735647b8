use std::fmt;

use crate::error::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAI,
    Ollama,
    Gemini,
}

impl Provider {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-5-20250929",
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Ollama => "llama3.1:8b",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }

    pub fn env_var_name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Ollama => "",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic (Claude)",
            Provider::OpenAI => "OpenAI",
            Provider::Ollama => "Ollama (local)",
            Provider::Gemini => "Google Gemini",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Provider> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Some(Provider::Anthropic),
            "openai" | "gpt" => Some(Provider::OpenAI),
            "ollama" | "local" => Some(Provider::Ollama),
            "gemini" | "google" => Some(Provider::Gemini),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::OpenAI => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
            Provider::Gemini => write!(f, "gemini"),
        }
    }
}

/// A fully resolved generation provider; no further lookups needed.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: Provider,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Resolve the active provider:
/// explicit name > provider whose API key is in the environment > Ollama
pub fn resolve_provider(
    explicit: Option<&str>,
    endpoint: Option<String>,
    model: Option<String>,
) -> Result<ResolvedProvider> {
    resolve_with(explicit, endpoint, model, |key| std::env::var(key).ok())
}

pub(crate) fn resolve_with(
    explicit: Option<&str>,
    endpoint: Option<String>,
    model: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedProvider> {
    let provider = match explicit {
        Some(name) => Provider::from_str_loose(name)
            .ok_or_else(|| RagError::Config(format!("Unknown LLM provider: {}", name)))?,
        None => [Provider::Anthropic, Provider::OpenAI, Provider::Gemini]
            .into_iter()
            .find(|p| env(p.env_var_name()).is_some())
            .unwrap_or(Provider::Ollama),
    };

    let api_key = if provider.requires_auth() {
        env(provider.env_var_name())
    } else {
        None
    };

    if provider.requires_auth() && api_key.is_none() {
        return Err(RagError::Config(format!(
            "No API key found for {}. Set {}",
            provider.display_name(),
            provider.env_var_name()
        )));
    }

    Ok(ResolvedProvider {
        provider,
        endpoint: endpoint.unwrap_or_else(|| provider.default_endpoint().to_string()),
        model: model.unwrap_or_else(|| provider.default_model().to_string()),
        api_key,
    })
}
