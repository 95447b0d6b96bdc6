//! Chatbot tools: named capabilities a query is routed to.
//!
//! A [`ToolRegistry`] is built once from configuration and owns the LLM and
//! embedding clients for its lifetime. Retrieval tools load their index the
//! first time they are called.

mod codegen;
mod retrieval;

pub use codegen::CodeGenerationTool;
pub use retrieval::RetrievalTool;

use crate::embeddings::EmbeddingProvider;
use crate::rag::RagResponse;
use askwell_core::config::ToolKind;
use askwell_core::{AppConfig, AppError, AppResult};
use askwell_llm::LlmClient;
use serde::Serialize;
use std::sync::Arc;

/// What a tool returns.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "output", rename_all = "lowercase")]
pub enum ToolOutput {
    /// Retrieval answer with its sources
    Answer(RagResponse),
    /// Free text, e.g. generated code
    Text(String),
}

impl ToolOutput {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(response) => &response.answer,
            Self::Text(text) => text,
        }
    }
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Routing hint shown to users and agents
    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind;

    async fn call(&self, query: &str) -> AppResult<ToolOutput>;
}

/// Name, description and kind of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
}

/// The configured tool set.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Build every tool listed in `config.tools`, sharing the given clients.
    pub fn from_config(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(config.tools.len());

        for settings in &config.tools {
            let tool: Arc<dyn Tool> = match settings.kind {
                ToolKind::Retrieval => {
                    let index = settings.index.as_deref().ok_or_else(|| {
                        AppError::Config(format!(
                            "Retrieval tool '{}' has no index configured",
                            settings.name
                        ))
                    })?;
                    Arc::new(RetrievalTool::new(
                        settings.clone(),
                        config.index_path(index),
                        config.prompts_dir(),
                        config.llm.clone(),
                        llm.clone(),
                        embedder.clone(),
                    ))
                }
                ToolKind::Generation => Arc::new(CodeGenerationTool::new(
                    settings.clone(),
                    config.prompts_dir(),
                    config.llm.clone(),
                    llm.clone(),
                )),
            };
            tracing::debug!(tool = %settings.name, kind = ?settings.kind, "Registered tool");
            tools.push(tool);
        }

        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> AppResult<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .cloned()
            .ok_or_else(|| {
                let available: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
                AppError::Tool(format!(
                    "Unknown tool '{}'. Available tools: {}",
                    name,
                    available.join(", ")
                ))
            })
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                kind: tool.kind(),
            })
            .collect()
    }
}
