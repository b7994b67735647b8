use std::path::Path;

use colored::Colorize;

use medrag::config::Config;
use medrag::embeddings::EmbeddingProvider;
use medrag::error::Result;
use medrag::questions::{load_questions, run_questions};
use medrag::retrieval::RetrievalService;

use super::{runtime, truncate_text};

/// Hits shown per question in text output.
const SHOWN_HITS: usize = 2;

pub fn cmd_eval(
    config: &Config,
    questions_path: &Path,
    limit: usize,
    top_k: usize,
    json: bool,
) -> Result<()> {
    let questions = load_questions(questions_path, Some(limit))?;
    let embedder = EmbeddingProvider::from_config(&config.embedding)?;
    let service = RetrievalService::open(config, embedder)?;

    let rt = runtime()?;
    let results = rt.block_on(run_questions(&service, questions, top_k))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No questions to run.".yellow());
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}", "=".repeat(60));
        println!(
            "{} #{} ({}) {}",
            "Question".green().bold(),
            i + 1,
            result.question.id,
            result.question.question
        );
        if result.hits.is_empty() {
            println!("  {}", "No matching chunks.".yellow());
        }
        for (rank, hit) in result.hits.iter().take(SHOWN_HITS).enumerate() {
            println!(
                "  {} #{} chunk {} ({:.3})",
                ">".green(),
                rank + 1,
                hit.chunk_id.to_string().cyan(),
                hit.similarity_score
            );
            println!("    {}", truncate_text(&hit.text, 200));
        }
        if let Some(answer) = &result.question.answer {
            println!("  {} {}", "Reference:".dimmed(), truncate_text(answer, 200));
        }
    }
    println!("{}", "=".repeat(60));
    println!("{} {} questions checked", "Done:".green().bold(), results.len());

    Ok(())
}
