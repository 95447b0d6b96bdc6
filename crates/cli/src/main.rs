//! askwell CLI
//!
//! Main entry point for the askwell command-line tool: ingest documentation
//! into local vector indexes and ask questions through the configured tools.

mod commands;

use askwell_core::{config::AppConfig, logging, AppResult};
use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, StatsCommand, ToolsCommand};
use std::path::PathBuf;

/// askwell - answers grounded in your documentation
#[derive(Parser, Debug)]
#[command(name = "askwell")]
#[command(about = "Answers grounded in your documentation", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ASKWELL_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ASKWELL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "ASKWELL_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "ASKWELL_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question through one of the configured tools
    Ask(AskCommand),

    /// List the configured tools
    Tools(ToolsCommand),

    /// Build or rebuild an index from web pages and local files
    Ingest(IngestCommand),

    /// Show statistics for a persisted index
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ask(_) => "ask",
            Commands::Tools(_) => "tools",
            Commands::Ingest(_) => "ingest",
            Commands::Stats(_) => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // --workspace decides which config file is read
    let config = AppConfig::load_with(cli.workspace, cli.config)?.with_overrides(
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;
    config.validate()?;

    tracing::info!("askwell starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("LLM: {} / {}", config.llm.provider, config.llm.model);
    tracing::debug!(
        "Embedding: {} / {}",
        config.embedding.provider,
        config.embedding.model
    );

    config.ensure_askwell_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Tools(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
