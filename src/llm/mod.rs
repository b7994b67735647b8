pub mod client;
pub mod prompts;
pub mod providers;

pub use client::{Answer, LlmClient};
pub use providers::{resolve_provider, Provider, ResolvedProvider};
