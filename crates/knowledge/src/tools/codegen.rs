use super::{Tool, ToolOutput};
use crate::rag::ask::complete;
use askwell_core::config::{LlmSettings, ToolKind, ToolSettings};
use askwell_core::AppResult;
use askwell_llm::LlmClient;
use askwell_prompt::{build_prompt, load_prompt, CODEGEN_DEFAULT};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Sends the query straight to the LLM, without retrieval.
pub struct CodeGenerationTool {
    settings: ToolSettings,
    prompts_dir: PathBuf,
    llm_settings: LlmSettings,
    llm: Arc<dyn LlmClient>,
}

impl CodeGenerationTool {
    pub fn new(
        settings: ToolSettings,
        prompts_dir: PathBuf,
        llm_settings: LlmSettings,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            settings,
            prompts_dir,
            llm_settings,
            llm,
        }
    }
}

#[async_trait::async_trait]
impl Tool for CodeGenerationTool {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn description(&self) -> &str {
        &self.settings.description
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Generation
    }

    async fn call(&self, query: &str) -> AppResult<ToolOutput> {
        let prompt_id = self.settings.prompt.as_deref().unwrap_or(CODEGEN_DEFAULT);
        let prompt = load_prompt(&self.prompts_dir, prompt_id)?;

        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        let built = build_prompt(&prompt, variables)?;

        let text = complete(self.llm.as_ref(), &self.llm_settings, built).await?;
        Ok(ToolOutput::Text(text))
    }
}
