//! Knowledge layer for askwell.
//!
//! Loads web pages and local files, splits them into chunks, embeds the
//! chunks batch by batch into a flat vector index persisted in SQLite, and
//! answers questions from that index through the configured tools.

pub mod embeddings;
pub mod index;
pub mod indexer;
pub mod ingest;
pub mod loader;
pub mod progress;
pub mod rag;
pub mod splitter;
pub mod tools;
pub mod types;

#[cfg(test)]
mod tests;

pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::{FlatIndex, SearchHit};
pub use indexer::{BatchError, BatchIndexer, IndexRunReport, IndexerOptions, SkippedBatch};
pub use ingest::{ingest, ingest_with, IngestOptions};
pub use progress::{ProgressEvent, ProgressReporter};
pub use rag::{RagResponse, RagSourceRef};
pub use tools::{Tool, ToolInfo, ToolOutput, ToolRegistry};
pub use types::{Chunk, Document, IndexStats, IngestStats, SourceKind};

use askwell_core::{AppConfig, AppResult};

/// Statistics for the named index.
pub fn stats(config: &AppConfig, index: &str) -> AppResult<IndexStats> {
    let path = config.index_path(index);
    tracing::info!("Getting stats for index '{}'", index);
    Ok(FlatIndex::load(&path)?.stats(&path))
}
