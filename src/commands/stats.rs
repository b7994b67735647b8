use colored::Colorize;

use medrag::config::Config;
use medrag::error::Result;
use medrag::index::store;
use medrag::manifest::BuildManifest;

pub fn cmd_stats(config: &Config) -> Result<()> {
    let chunks_path = config.chunks_path();
    if !chunks_path.exists() {
        println!(
            "{} No index in {}. Run 'medrag build <corpus>' first.",
            "Not found:".yellow(),
            config.data_dir.display()
        );
        return Ok(());
    }

    let stats = store::stats(&chunks_path)?;
    let manifest = BuildManifest::load(&config.manifest_path())?;

    println!("{}", "medrag index".green().bold());
    println!("{}", "=".repeat(40));
    println!(
        "  Data directory:  {}",
        config.data_dir.display().to_string().cyan()
    );
    println!(
        "  Chunk file:      {}",
        humansize::format_size(stats.file_bytes, humansize::BINARY)
    );
    println!("  Chunks:          {}", stats.lengths.count);
    if stats.lengths.count > 0 {
        println!(
            "  Chunk length:    min {}, max {}, mean {:.1}",
            stats.lengths.min_len, stats.lengths.max_len, stats.lengths.mean_len
        );
    }
    if let Some(dimension) = stats.dimension {
        println!("  Dimension:       {}", dimension);
    }
    println!("  Documents:       {}", stats.by_document.len());

    match manifest {
        Some(m) => {
            println!("  Encoder:         {}", m.model_id.cyan());
            println!("  Index kind:      {}", m.index);
            println!(
                "  Chunking:        max {}, overlap {}, min paragraph {}",
                m.chunking.max_chunk_size, m.chunking.overlap, m.chunking.min_paragraph_len
            );
            println!("  Sources:         {}", m.sources.len());
            println!(
                "  Built:           {}",
                m.built_at.format("%Y-%m-%d %H:%M UTC").to_string().dimmed()
            );
        }
        None => println!("  {}", "No build manifest found.".yellow()),
    }

    Ok(())
}
