//! Command handlers for the askwell CLI.

pub mod ask;
pub mod ingest;
pub mod stats;
pub mod tools;

pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;
pub use tools::ToolsCommand;

use askwell_core::{AppConfig, AppResult};
use askwell_knowledge::{create_provider, ToolRegistry};
use askwell_llm::create_client;

/// Build the configured tool set with fresh LLM and embedding clients.
pub(crate) fn registry(config: &AppConfig) -> AppResult<ToolRegistry> {
    let llm = create_client(&config.llm, config.llm_api_key().as_deref())?;
    let embedder = create_provider(&config.embedding, config.embedding_api_key().as_deref())?;
    ToolRegistry::from_config(config, llm, embedder)
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
