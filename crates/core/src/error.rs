//! Error types for askwell.
//!
//! One enum covers every run-level failure: configuration, I/O, LLM calls,
//! embeddings, index handling, ingestion, prompts and tools. Failures that
//! only affect a single indexing batch are modelled separately in the
//! knowledge crate and never surface as `AppError`.

use thiserror::Error;

/// Unified error type for askwell.
///
/// Library functions return `Result<T, AppError>` and never panic on
/// recoverable conditions.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index errors (build, merge, search, load)
    #[error("Index error: {0}")]
    Index(String),

    /// Document loading and ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Tool lookup and execution errors
    #[error("Tool error: {0}")]
    Tool(String),

    /// No batch of an indexing run produced a partition; nothing was written.
    #[error("All {batches} batches failed to embed; no index was written")]
    AllBatchesFailed { batches: usize },

    /// Writing the finished index to disk failed.
    #[error("Failed to persist index: {0}")]
    Persistence(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
