use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "medrag",
    about = "Medical knowledge-base chunking, indexing and retrieval",
    version
)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(global = true, long, short)]
    pub verbose: bool,

    /// Data directory holding the chunk file, manifest and medrag.json
    #[arg(global = true, long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chunk, embed and index a corpus (file or directory)
    Build {
        /// Corpus path: .json, .txt, .md or a directory of them
        corpus: PathBuf,

        /// Rebuild even if sources and settings are unchanged
        #[arg(long)]
        force: bool,

        /// Index kind override (flat, ivf)
        #[arg(long)]
        index: Option<String>,

        /// Maximum chunk size in characters
        #[arg(long)]
        max_chunk_size: Option<usize>,

        /// Overlap between neighbouring chunks in characters
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Return the chunks most similar to a query
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from retrieved chunks
    Ask {
        /// Question text
        question: String,

        /// Number of chunks handed to the model
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// LLM provider override (anthropic, openai, ollama, gemini)
        #[arg(long)]
        provider: Option<String>,

        /// Print only the retrieved context, without calling a model
        #[arg(long)]
        context_only: bool,
    },

    /// Run retrieval over a question set and show top hits next to reference answers
    Eval {
        /// Question file: JSON array or object of {question, answer} items
        questions: PathBuf,

        /// Number of questions to run
        #[arg(short = 'n', long, default_value_t = 3)]
        limit: usize,

        /// Chunks retrieved per question
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what the current index was built from
    Stats,

    /// Prompt for questions in a loop
    Interactive {
        /// Number of chunks per question
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// LLM provider override (anthropic, openai, ollama, gemini)
        #[arg(long)]
        provider: Option<String>,

        /// Show retrieved chunks instead of generating answers
        #[arg(long)]
        search_only: bool,
    },
}
