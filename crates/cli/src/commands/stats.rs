//! Stats command handler.
//!
//! Shows what a persisted index contains.

use askwell_core::{AppConfig, AppResult};
use clap::Args;

/// Show statistics for a persisted index
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Index name (under .askwell/indexes) or absolute path
    #[arg(short, long)]
    pub index: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for index '{}'", self.index);

        let stats = askwell_knowledge::stats(config, &self.index)?;

        if self.json {
            return super::print_json(&stats);
        }

        println!("Index: {}", self.index);
        println!("  Path: {}", stats.path);
        println!("  Entries: {}", stats.entries);
        println!("  Sources: {}", stats.sources);
        println!("  Dimensions: {}", stats.dimensions);
        println!(
            "  Embedding: {} / {}",
            stats.embedding_provider, stats.embedding_model
        );
        println!("  Created: {}", stats.created_at);
        println!("  Size: {} bytes", stats.size_bytes);

        Ok(())
    }
}
