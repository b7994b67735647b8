use colored::Colorize;
use dialoguer::Input;

use medrag::config::Config;
use medrag::embeddings::EmbeddingProvider;
use medrag::error::{RagError, Result};
use medrag::llm::LlmClient;
use medrag::retrieval::RetrievalService;

use super::ask::{answer_question, print_contexts};
use super::runtime;

const QUIT_WORDS: &[&str] = &["quit", "exit", "q"];

pub fn cmd_interactive(
    config: &Config,
    top_k: usize,
    provider_override: Option<&str>,
    search_only: bool,
) -> Result<()> {
    let embedder = EmbeddingProvider::from_config(&config.embedding)?;
    let service = RetrievalService::open(config, embedder)?;
    let client = if search_only {
        None
    } else {
        Some(LlmClient::new(&config.resolve_llm(provider_override)?))
    };
    let rt = runtime()?;

    println!(
        "{} {} chunks loaded. Type a question, or 'quit' to leave.",
        "Ready:".green().bold(),
        service.len()
    );

    loop {
        let line: String = Input::<String>::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| RagError::Config(format!("Input cancelled: {}", e)))?;
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if QUIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }

        let outcome = match &client {
            Some(client) => answer_question(&rt, &service, client, question, top_k),
            None => rt
                .block_on(service.sources_for(question, top_k))
                .map(|sources| print_contexts(&sources)),
        };
        // One failed question does not end the session
        if let Err(e) = outcome {
            eprintln!("{} {}", "Error:".red(), e);
        }
    }

    Ok(())
}
