mod cli;
mod commands;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use medrag::config::Overrides;
use medrag::{Config, Result};

use commands::ask::cmd_ask;
use commands::build::cmd_build;
use commands::eval::cmd_eval;
use commands::interactive::cmd_interactive;
use commands::search::cmd_search;
use commands::stats::cmd_stats;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// RUST_LOG wins, then MEDRAG_LOG, then warn (debug with --verbose).
fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("MEDRAG_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let overrides = match &cli.command {
        Commands::Build {
            index,
            max_chunk_size,
            overlap,
            ..
        } => Overrides {
            index: index.clone(),
            max_chunk_size: *max_chunk_size,
            overlap: *overlap,
        },
        _ => Overrides::default(),
    };
    let config = Config::load(cli.data_dir.as_deref(), &overrides)?;

    match cli.command {
        Commands::Build { corpus, force, .. } => cmd_build(&config, &corpus, force),
        Commands::Search { query, top_k, json } => {
            cmd_search(&config, &query, top_k.unwrap_or(config.top_k), json)
        }
        Commands::Ask {
            question,
            top_k,
            provider,
            context_only,
        } => cmd_ask(
            &config,
            &question,
            top_k.unwrap_or(config.top_k),
            provider.as_deref(),
            context_only,
        ),
        Commands::Eval {
            questions,
            limit,
            top_k,
            json,
        } => cmd_eval(
            &config,
            &questions,
            limit,
            top_k.unwrap_or(config.top_k),
            json,
        ),
        Commands::Stats => cmd_stats(&config),
        Commands::Interactive {
            top_k,
            provider,
            search_only,
        } => cmd_interactive(
            &config,
            top_k.unwrap_or(config.top_k),
            provider.as_deref(),
            search_only,
        ),
    }
}
