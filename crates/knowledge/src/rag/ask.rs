//! RAG answering orchestration.
//!
//! Embeds the query, retrieves the closest passages, renders them into the
//! answer prompt and asks the LLM.

use crate::embeddings::EmbeddingProvider;
use crate::index::{FlatIndex, SearchHit};
use crate::rag::types::{RagResponse, RagSourceRef};
use askwell_core::config::LlmSettings;
use askwell_core::AppResult;
use askwell_llm::{LlmClient, LlmRequest};
use askwell_prompt::{build_prompt, BuiltPrompt, PromptDefinition};
use std::collections::{HashMap, HashSet};

/// Maximum snippet length for source references.
const MAX_SNIPPET_LENGTH: usize = 150;

/// Everything one retrieval answer needs.
pub struct RagRequest<'a> {
    pub index: &'a FlatIndex,
    pub embedder: &'a dyn EmbeddingProvider,
    pub llm: &'a dyn LlmClient,
    pub llm_settings: &'a LlmSettings,
    /// Answer prompt; must accept `context` and `query`
    pub prompt: &'a PromptDefinition,
    pub query: &'a str,
    pub top_k: usize,
}

/// Embed `query` and return the `top_k` closest passages, best first.
pub async fn retrieve(
    index: &FlatIndex,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    top_k: usize,
) -> AppResult<Vec<SearchHit>> {
    let query_embedding = embedder.embed(query).await?;
    index.search(&query_embedding, top_k)
}

/// Answer a question from the passages retrieved out of an index.
///
/// When nothing is retrieved the LLM is still asked, with an empty context,
/// and the response has no sources.
pub async fn ask_rag(request: RagRequest<'_>) -> AppResult<RagResponse> {
    tracing::info!(
        top_k = request.top_k,
        entries = request.index.len(),
        "RAG answering for query: {}",
        request.query
    );

    let hits = retrieve(request.index, request.embedder, request.query, request.top_k).await?;

    if let Some(best) = hits.first() {
        tracing::info!(
            "Retrieved {} passages (max score: {:.3})",
            hits.len(),
            best.score
        );
    } else {
        tracing::info!("No passages retrieved; answering without context");
    }

    let mut variables = HashMap::new();
    variables.insert("context".to_string(), build_context(&hits));
    variables.insert("query".to_string(), request.query.to_string());
    let built = build_prompt(request.prompt, variables)?;

    let answer = complete(request.llm, request.llm_settings, built).await?;

    Ok(RagResponse::new(answer, map_hits_to_sources(&hits)))
}

/// Send a built prompt with the configured generation settings.
pub(crate) async fn complete(
    llm: &dyn LlmClient,
    settings: &LlmSettings,
    built: BuiltPrompt,
) -> AppResult<String> {
    tracing::debug!(
        provider = llm.provider_name(),
        model = %settings.model,
        prompt_id = %built.metadata.source_prompt_id,
        "Calling LLM"
    );

    let mut request = LlmRequest::from_settings(built.user, settings);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    let response = llm.complete(&request).await?;
    Ok(response.content)
}

/// Passage texts in rank order, separated by blank lines.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One reference per distinct source, in rank order.
pub fn map_hits_to_sources(hits: &[SearchHit]) -> Vec<RagSourceRef> {
    let mut seen = HashSet::new();

    hits.iter()
        .filter(|hit| seen.insert(hit.source.as_str()))
        .map(|hit| RagSourceRef {
            source: hit.source.clone(),
            snippet: truncate_snippet(&hit.text, MAX_SNIPPET_LENGTH),
            score: hit.score,
        })
        .collect()
}

/// Truncate to at most `max_chars` characters, preferring a word boundary.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let cut = match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => byte_index,
        None => return text.to_string(),
    };

    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::index::EmbeddingModel;
    use crate::tests::doubles::EchoLlm;
    use crate::types::Chunk;

    fn hit(text: &str, source: &str, score: f32) -> SearchHit {
        SearchHit {
            id: format!("{}-{}", source, score),
            text: text.to_string(),
            source: source.to_string(),
            position: 0,
            metadata: serde_json::Value::Null,
            score,
        }
    }

    async fn sample_index(embedder: &TrigramProvider) -> FlatIndex {
        let chunks = vec![
            Chunk::new(
                "Secure VPC design uses private subnets and security groups.",
                "https://docs.example.com/security",
                0,
            ),
            Chunk::new(
                "Rightsizing instances lowers monthly cost.",
                "https://docs.example.com/cost",
                0,
            ),
        ];
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        FlatIndex::build(&chunks, vectors, EmbeddingModel::new("trigram", "trigram-v1")).unwrap()
    }

    #[test]
    fn test_build_context_concatenates_in_rank_order() {
        let hits = vec![hit(" first ", "a", 0.9), hit("second", "b", 0.5)];
        assert_eq!(build_context(&hits), "first\n\nsecond");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_sources_deduplicated_in_rank_order() {
        let hits = vec![
            hit("one", "https://docs.example.com/a", 0.9),
            hit("two", "https://docs.example.com/b", 0.8),
            hit("three", "https://docs.example.com/a", 0.7),
        ];
        let sources = map_hits_to_sources(&hits);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source, "https://docs.example.com/a");
        assert_eq!(sources[0].snippet, "one");
        assert_eq!(sources[1].score, 0.8);
    }

    #[test]
    fn test_truncate_snippet() {
        assert_eq!(truncate_snippet("Short text", 100), "Short text");

        let long = "This is a very long text that needs to be truncated at some point";
        let result = truncate_snippet(long, 30);
        assert_eq!(result, "This is a very long text that...");

        let accented = "é".repeat(40);
        assert_eq!(truncate_snippet(&accented, 10), format!("{}...", "é".repeat(10)));
    }

    #[tokio::test]
    async fn test_ask_rag_renders_context_and_query() {
        let embedder = TrigramProvider::new(256);
        let index = sample_index(&embedder).await;
        let llm = EchoLlm::default();
        let prompt = askwell_prompt::builtin_prompt(askwell_prompt::RAG_DETAILED).unwrap();
        let settings = LlmSettings::default();

        let response = ask_rag(RagRequest {
            index: &index,
            embedder: &embedder,
            llm: &llm,
            llm_settings: &settings,
            prompt: &prompt,
            query: "How can I design secure VPCs?",
            top_k: 1,
        })
        .await
        .unwrap();

        assert!(response.answer.starts_with("Use the following pieces of context"));
        assert!(response.answer.contains("private subnets"));
        assert!(response.answer.contains("Question: How can I design secure VPCs?"));
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].source, "https://docs.example.com/security");

        let sent = llm.requests();
        assert_eq!(sent[0].max_tokens, Some(4096));
        assert_eq!(sent[0].temperature, Some(0.5));
        assert_eq!(sent[0].top_p, Some(0.2));
    }

    #[tokio::test]
    async fn test_ask_rag_with_zero_top_k_still_answers() {
        let embedder = TrigramProvider::new(256);
        let index = sample_index(&embedder).await;
        let llm = EchoLlm::default();
        let prompt = askwell_prompt::builtin_prompt(askwell_prompt::RAG_DETAILED).unwrap();
        let settings = LlmSettings::default();

        let response = ask_rag(RagRequest {
            index: &index,
            embedder: &embedder,
            llm: &llm,
            llm_settings: &settings,
            prompt: &prompt,
            query: "anything",
            top_k: 0,
        })
        .await
        .unwrap();

        assert!(response.sources.is_empty());
        assert!(response.answer.contains("Question: anything"));
    }

    #[tokio::test]
    async fn test_retrieve_dimension_mismatch() {
        let embedder = TrigramProvider::new(256);
        let index = sample_index(&embedder).await;
        let other = TrigramProvider::new(64);
        assert!(retrieve(&index, &other, "vpc", 2).await.is_err());
    }
}
