//! OpenAI embeddings provider.
//!
//! Sends a whole batch in one `POST {endpoint}/embeddings` request.

use crate::embeddings::EmbeddingProvider;
use askwell_core::config::EmbeddingSettings;
use askwell_core::{AppError, AppResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingSettings, api_key: &str) -> AppResult<Self> {
        if config.model.trim().is_empty() {
            return Err(AppError::Config("Missing OpenAI embedding model name".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| AppError::Config("Invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to build OpenAI HTTP client: {}", e))
            })?;

        let base_url = config.endpoint.as_deref().unwrap_or(DEFAULT_OPENAI_URL);

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    /// Order by `index` and check count and width against the request.
    fn into_vectors(
        &self,
        mut parsed: EmbeddingResponse,
        expected: usize,
    ) -> AppResult<Vec<Vec<f32>>> {
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != expected {
            return Err(AppError::Embedding(format!(
                "OpenAI returned {} embeddings for {} inputs",
                parsed.data.len(),
                expected
            )));
        }

        if let Some(bad) = parsed
            .data
            .iter()
            .find(|entry| entry.embedding.len() != self.dimensions)
        {
            return Err(AppError::Embedding(format!(
                "OpenAI returned {} dimensions, expected {}",
                bad.embedding.len(),
                self.dimensions
            )));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dimensions),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("OpenAI embeddings request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::Embedding(format!(
                "OpenAI embeddings request failed ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
            AppError::Embedding(format!("Failed to parse OpenAI embedding response: {}", e))
        })?;

        self.into_vectors(parsed, texts.len())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
