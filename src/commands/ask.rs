use colored::Colorize;
use tokio::runtime::Runtime;

use medrag::config::Config;
use medrag::embeddings::EmbeddingProvider;
use medrag::error::Result;
use medrag::index::QueryResult;
use medrag::llm::LlmClient;
use medrag::retrieval::RetrievalService;

use super::{runtime, truncate_text};

pub fn cmd_ask(
    config: &Config,
    question: &str,
    top_k: usize,
    provider_override: Option<&str>,
    context_only: bool,
) -> Result<()> {
    let embedder = EmbeddingProvider::from_config(&config.embedding)?;
    let service = RetrievalService::open(config, embedder)?;
    let rt = runtime()?;

    if context_only {
        let sources = rt.block_on(service.sources_for(question, top_k))?;
        print_contexts(&sources);
        return Ok(());
    }

    let client = LlmClient::new(&config.resolve_llm(provider_override)?);
    answer_question(&rt, &service, &client, question, top_k)
}

/// Retrieve context for one question, print the generated answer and the
/// chunks it was grounded on.
pub fn answer_question(
    rt: &Runtime,
    service: &RetrievalService<EmbeddingProvider>,
    client: &LlmClient,
    question: &str,
    top_k: usize,
) -> Result<()> {
    let sources = rt.block_on(service.sources_for(question, top_k))?;
    let contexts: Vec<String> = sources.iter().map(|r| r.text.clone()).collect();
    let answer = rt.block_on(client.answer(question, &contexts))?;

    println!("\n{}", answer.answer);
    println!(
        "\n{} {} passages, model {}",
        "Sources:".dimmed(),
        sources.len(),
        client.model().cyan()
    );
    for (i, source) in sources.iter().enumerate() {
        println!(
            "  {}. chunk {} ({:.3}) {}",
            i + 1,
            source.chunk_id.to_string().cyan(),
            source.similarity_score,
            truncate_text(&source.text, 80)
        );
    }
    Ok(())
}

pub fn print_contexts(sources: &[QueryResult]) {
    if sources.is_empty() {
        println!("{}", "No relevant passages.".yellow());
        return;
    }
    for (i, source) in sources.iter().enumerate() {
        println!(
            "  {} [{}] chunk {} ({:.3})",
            ">".green(),
            i + 1,
            source.chunk_id.to_string().cyan(),
            source.similarity_score
        );
        println!("    {}\n", truncate_text(&source.text, 300));
    }
}
