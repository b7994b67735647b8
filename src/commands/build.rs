use std::path::Path;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use medrag::config::Config;
use medrag::corpus;
use medrag::embeddings::{Embedder, EmbeddingProvider};
use medrag::error::Result;
use medrag::index::new_index;
use medrag::manifest::BuildManifest;
use medrag::pipeline;
use medrag::retrieval::RetrievalService;

use super::runtime;

pub fn cmd_build(config: &Config, corpus_path: &Path, force: bool) -> Result<()> {
    let corpus = corpus::load_documents(corpus_path)?;
    let embedder = EmbeddingProvider::from_config(&config.embedding)?;

    let mut manifest = BuildManifest::new(
        embedder.model_id(),
        embedder.dimension(),
        config.chunking,
        config.index.kind,
    );
    for source in &corpus.sources {
        manifest.record_source(source)?;
    }

    if !force && config.chunks_path().exists() {
        if let Some(previous) = BuildManifest::load(&config.manifest_path())? {
            if previous.is_up_to_date(&manifest) {
                println!(
                    "{}",
                    "Index is up to date. Use --force to rebuild.".green()
                );
                return Ok(());
            }
        }
    }

    println!(
        "{} {} documents from {} ({} files)",
        "Building".green().bold(),
        corpus.documents.len(),
        corpus_path.display(),
        corpus.sources.len()
    );
    if corpus.skipped > 0 {
        eprintln!(
            "{} {} corpus items without text",
            "Skipped".yellow(),
            corpus.skipped
        );
    }

    let chunked = pipeline::chunk_corpus(&corpus.documents, &config.chunking)?;
    for id in &chunked.skipped {
        eprintln!(
            "{} {}: no paragraph of at least {} characters",
            "Skipped".yellow(),
            id,
            config.chunking.min_paragraph_len
        );
    }
    let stats = chunked.stats();

    let pb = ProgressBar::new(chunked.chunk_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message("embedding");

    let index = new_index(config.index.kind, config.index.ivf, Some(config.chunks_path()));
    let mut service = RetrievalService::init(embedder, index)?;

    let rt = runtime()?;
    let records = rt.block_on(pipeline::embed_corpus(service.embedder(), chunked, |n| {
        pb.inc(n as u64)
    }))?;
    pb.finish_with_message("done");

    service.index_records(records)?;
    service.ready()?;

    manifest.chunk_count = service.len();
    manifest.save(&config.manifest_path())?;

    println!("\n{} Index built:", "Done!".green().bold());
    println!("  Chunks:        {}", stats.count);
    if stats.count > 0 {
        println!(
            "  Chunk length:  min {}, max {}, mean {:.1}",
            stats.min_len, stats.max_len, stats.mean_len
        );
    }
    println!("  Encoder:       {}", manifest.model_id.cyan());
    println!("  Index:         {}", manifest.index);
    println!(
        "  Chunk file:    {}",
        config.chunks_path().display().to_string().cyan()
    );
    println!("\nSearch with:");
    println!("  {}", "medrag search \"your question\"".cyan());

    Ok(())
}
