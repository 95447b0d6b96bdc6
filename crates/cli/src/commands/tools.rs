//! Tools command handler.
//!
//! Lists the tools a query can be routed to.

use askwell_core::{AppConfig, AppResult};
use clap::Args;

/// List the configured tools
#[derive(Args, Debug)]
pub struct ToolsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ToolsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing tools command");

        let tools = super::registry(config)?.list();

        if self.json {
            return super::print_json(&tools);
        }

        if tools.is_empty() {
            println!("No tools configured");
            return Ok(());
        }

        for tool in &tools {
            println!("{} ({})", tool.name, tool.kind.as_str());
            println!("  {}", tool.description);
        }

        Ok(())
    }
}
