//! LLM provider factory.
//!
//! Builds a client from the `llm` configuration section, resolving the
//! provider name, endpoint and API key.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use askwell_core::config::LlmSettings;
use askwell_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client from settings.
///
/// # Errors
/// Returns error if:
/// - Provider is unknown
/// - The provider needs an API key and none was resolved
/// - The HTTP client cannot be built
pub fn create_client(
    settings: &LlmSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider = ProviderType::parse(&settings.provider).ok_or_else(|| {
        AppError::Config(format!("Unknown LLM provider: {}", settings.provider))
    })?;

    let endpoint = settings
        .endpoint
        .as_deref()
        .unwrap_or(provider.default_endpoint());
    let timeout = Duration::from_secs(settings.timeout_secs);

    tracing::debug!(
        provider = provider.as_str(),
        endpoint,
        model = %settings.model,
        "Creating LLM client"
    );

    match provider {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_base_url(endpoint, timeout)?)),
        ProviderType::OpenAI => {
            let api_key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                AppError::Config(
                    "OpenAI provider requires an API key (set ASKWELL_API_KEY or llm.apiKeyEnv)"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(OpenAiClient::new(endpoint, api_key, timeout)?))
        }
    }
}
