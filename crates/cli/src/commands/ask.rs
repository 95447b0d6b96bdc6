//! Ask command handler.
//!
//! Routes a query to one named tool and prints its answer with the
//! resources it was drawn from.

use askwell_core::{AppConfig, AppError, AppResult};
use askwell_knowledge::{RagSourceRef, ToolOutput};
use clap::Args;

/// Ask a question through one of the configured tools
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Tool to route the query to (see `askwell tools`)
    #[arg(short, long)]
    pub tool: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command with tool '{}'", self.tool);

        if self.query.trim().is_empty() {
            return Err(AppError::Config("No query provided".to_string()));
        }

        let registry = super::registry(config)?;
        let tool = registry.get(&self.tool)?;
        let output = tool.call(&self.query).await?;

        if self.json {
            let value = serde_json::json!({
                "tool": self.tool,
                "query": self.query,
                "result": output,
            });
            return super::print_json(&value);
        }

        match &output {
            ToolOutput::Answer(response) => {
                tracing::debug!(
                    "Answer used {} sources (max score {:.3})",
                    response.sources.len(),
                    response.max_score
                );
                println!("{}", response.answer.trim());
                println!();
                print!("{}", render_resources(&response.sources));
            }
            ToolOutput::Text(text) => println!("{}", text.trim()),
        }

        Ok(())
    }
}

/// The `Resources:` block listed under a retrieval answer.
fn render_resources(sources: &[RagSourceRef]) -> String {
    if sources.is_empty() {
        return "Resources: (none)\n".to_string();
    }

    let mut out = String::from("Resources:\n");
    for source in sources {
        out.push_str(&format!("- {} (score {:.3})\n", source.source, source.score));
    }
    out
}
