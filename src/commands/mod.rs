pub mod ask;
pub mod build;
pub mod eval;
pub mod interactive;
pub mod search;
pub mod stats;

use medrag::error::{RagError, Result};

/// Current-thread runtime for one command's async work.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RagError::Config(format!("tokio runtime: {}", e)))
}

/// Shorten `text` to at most `max` characters for terminal output.
pub fn truncate_text(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
