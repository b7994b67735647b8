use colored::Colorize;

use medrag::config::Config;
use medrag::embeddings::EmbeddingProvider;
use medrag::error::Result;
use medrag::retrieval::RetrievalService;

use super::{runtime, truncate_text};

pub fn cmd_search(config: &Config, query: &str, top_k: usize, json: bool) -> Result<()> {
    let embedder = EmbeddingProvider::from_config(&config.embedding)?;
    let service = RetrievalService::open(config, embedder)?;

    let rt = runtime()?;
    let results = rt.block_on(service.search_similar_chunks(query, top_k))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No matching chunks.".yellow());
        return Ok(());
    }

    println!(
        "{} Top {} chunks for '{}':\n",
        "Search".green().bold(),
        results.len(),
        query
    );
    for (rank, result) in results.iter().enumerate() {
        println!(
            "  {} #{} chunk {} ({:.3})",
            ">".green(),
            rank + 1,
            result.chunk_id.to_string().cyan(),
            result.similarity_score
        );
        println!("    {}\n", truncate_text(&result.text, 200));
    }

    Ok(())
}
