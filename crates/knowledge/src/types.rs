//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indexer::IndexRunReport;

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    File,
}

/// A loaded document, before splitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// URL or file path
    pub source: String,

    pub kind: SourceKind,

    /// Extracted plain text
    pub text: String,

    /// Page title when the loader found one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub loaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(source: impl Into<String>, kind: SourceKind, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            text: text.into(),
            title: None,
            loaded_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A unit of text to embed, tagged with its provenance.
///
/// Immutable once produced by the splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content
    pub text: String,

    /// Originating URL or file path
    pub source: String,

    /// Position within source
    pub position: u32,

    /// Extra provenance (byte offset, title, source kind)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, position: u32) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            position,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    /// Name or path of the written index
    pub index: String,

    /// URLs collected from sitemaps and `--url`
    pub urls_total: usize,

    /// Pages fetched and extracted
    pub pages_loaded: usize,

    /// Pages that failed to load and were skipped
    pub pages_failed: usize,

    /// Local files loaded
    pub files_loaded: usize,

    /// Chunks produced by the splitter
    pub chunks_total: usize,

    /// Bytes of extracted text
    pub bytes_processed: u64,

    /// Outcome of the batched index build
    pub index_run: IndexRunReport,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub path: String,
    pub entries: usize,
    pub sources: usize,
    pub dimensions: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}
