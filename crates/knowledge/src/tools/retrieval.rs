use super::{Tool, ToolOutput};
use crate::embeddings::EmbeddingProvider;
use crate::index::FlatIndex;
use crate::rag::{ask_rag, RagRequest};
use askwell_core::config::{LlmSettings, ToolKind, ToolSettings};
use askwell_core::{AppError, AppResult};
use askwell_llm::LlmClient;
use askwell_prompt::{load_prompt, RAG_DETAILED};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Answers from passages retrieved out of one index.
pub struct RetrievalTool {
    settings: ToolSettings,
    index_path: PathBuf,
    prompts_dir: PathBuf,
    llm_settings: LlmSettings,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: OnceCell<FlatIndex>,
}

impl RetrievalTool {
    pub fn new(
        settings: ToolSettings,
        index_path: PathBuf,
        prompts_dir: PathBuf,
        llm_settings: LlmSettings,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            settings,
            index_path,
            prompts_dir,
            llm_settings,
            llm,
            embedder,
            index: OnceCell::new(),
        }
    }

    /// The index, read from disk on first use.
    async fn index(&self) -> AppResult<&FlatIndex> {
        self.index
            .get_or_try_init(|| async {
                let path = self.index_path.clone();
                let index = tokio::task::spawn_blocking(move || FlatIndex::load(&path))
                    .await
                    .map_err(|e| AppError::Index(format!("Index loader task failed: {}", e)))??;

                let model = index.embedding_model();
                if model.provider != self.embedder.provider_name()
                    || model.model != self.embedder.model_name()
                {
                    tracing::warn!(
                        tool = %self.settings.name,
                        index_provider = %model.provider,
                        index_model = %model.model,
                        query_provider = self.embedder.provider_name(),
                        query_model = self.embedder.model_name(),
                        "Index was built with a different embedding model"
                    );
                }

                tracing::info!(
                    tool = %self.settings.name,
                    entries = index.len(),
                    path = %self.index_path.display(),
                    "Loaded index"
                );
                Ok::<_, AppError>(index)
            })
            .await
    }
}

#[async_trait::async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn description(&self) -> &str {
        &self.settings.description
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Retrieval
    }

    async fn call(&self, query: &str) -> AppResult<ToolOutput> {
        let index = self.index().await?;
        let prompt_id = self.settings.prompt.as_deref().unwrap_or(RAG_DETAILED);
        let prompt = load_prompt(&self.prompts_dir, prompt_id)?;

        let response = ask_rag(RagRequest {
            index,
            embedder: self.embedder.as_ref(),
            llm: self.llm.as_ref(),
            llm_settings: &self.llm_settings,
            prompt: &prompt,
            query,
            top_k: self.settings.top_k,
        })
        .await?;

        Ok(ToolOutput::Answer(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::index::EmbeddingModel;
    use crate::tests::doubles::EchoLlm;
    use crate::types::Chunk;
    use askwell_core::config::default_tools;
    use tempfile::TempDir;

    async fn write_index(dir: &std::path::Path, embedder: &TrigramProvider) {
        let chunks = vec![
            Chunk::new(
                "Enable multi-factor authentication for the root user.",
                "https://docs.example.com/security/mfa",
                0,
            ),
            Chunk::new(
                "Use Savings Plans for steady workloads.",
                "https://docs.example.com/cost/plans",
                0,
            ),
        ];
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        FlatIndex::build(&chunks, vectors, EmbeddingModel::new("trigram", "trigram-v1"))
            .unwrap()
            .persist(dir)
            .unwrap();
    }

    fn tool(temp: &TempDir, llm: Arc<EchoLlm>) -> RetrievalTool {
        RetrievalTool::new(
            default_tools().remove(0),
            temp.path().join("local_index"),
            temp.path().join("prompts"),
            LlmSettings::default(),
            llm,
            Arc::new(TrigramProvider::new(128)),
        )
    }

    #[tokio::test]
    async fn test_call_answers_with_sources() {
        let temp = TempDir::new().unwrap();
        write_index(&temp.path().join("local_index"), &TrigramProvider::new(128)).await;
        let llm = Arc::new(EchoLlm::default());
        let tool = tool(&temp, llm.clone());

        let output = tool
            .call("How do I protect the root user with authentication?")
            .await
            .unwrap();

        match output {
            ToolOutput::Answer(response) => {
                assert_eq!(
                    response.sources[0].source,
                    "https://docs.example.com/security/mfa"
                );
                assert!(response.answer.contains("multi-factor"));
            }
            other => panic!("expected an answer, got {:?}", other),
        }
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_index_is_reported() {
        let temp = TempDir::new().unwrap();
        let tool = tool(&temp, Arc::new(EchoLlm::default()));

        let err = tool.call("anything").await.unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
    }

    #[tokio::test]
    async fn test_index_loaded_once() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("local_index");
        write_index(&dir, &TrigramProvider::new(128)).await;
        let tool = tool(&temp, Arc::new(EchoLlm::default()));

        tool.call("first").await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(tool.call("second").await.is_ok());
    }
}
