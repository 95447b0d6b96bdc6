//! Split documents into overlapping chunks.

use crate::types::{Chunk, Document};
use askwell_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Character-based recursive splitter.
///
/// Prefers paragraph, then sentence, then word boundaries, never exceeding
/// `chunk_size` characters, with `chunk_overlap` characters shared between
/// neighbours.
pub struct DocumentSplitter {
    splitter: TextSplitter<text_splitter::Characters>,
}

impl DocumentSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config("Chunk size must be at least 1".to_string()));
        }

        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk overlap: {}", e)))?;

        Ok(Self {
            splitter: TextSplitter::new(config),
        })
    }

    /// Chunks of one document, numbered from 0 within that document.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.splitter
            .chunk_indices(&document.text)
            .filter(|(_, text)| !text.trim().is_empty())
            .enumerate()
            .map(|(position, (byte_offset, text))| {
                let mut metadata = serde_json::json!({
                    "byte_offset": byte_offset,
                    "kind": document.kind,
                });
                if let Some(title) = &document.title {
                    metadata["title"] = serde_json::Value::String(title.clone());
                }
                Chunk::new(text, &document.source, position as u32).with_metadata(metadata)
            })
            .collect()
    }

    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }
}
