//! Exact cosine-similarity index over embedded chunks.
//!
//! A [`FlatIndex`] keeps every entry in memory and scores a query against all
//! of them. Partitions built from separate batches are combined with
//! [`FlatIndex::merge_from`], and the whole index is written once with
//! [`FlatIndex::persist`].

mod store;

use crate::types::{Chunk, IndexStats};
use askwell_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use store::INDEX_FILE;

/// Embedding model an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub provider: String,
    pub model: String,
}

impl EmbeddingModel {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

/// One embedded chunk with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub source: String,
    pub position: u32,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// A scored search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub source: String,
    pub position: u32,
    pub metadata: serde_json::Value,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimensions: usize,
    embedding: EmbeddingModel,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Build a partition from chunks and their vectors.
    ///
    /// Fails when the counts differ, when there is nothing to index, or when
    /// a vector is empty, has a different width from the first, or contains
    /// a non-finite value.
    pub fn build(
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
        embedding: EmbeddingModel,
    ) -> AppResult<Self> {
        if chunks.len() != vectors.len() {
            return Err(AppError::Index(format!(
                "Got {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = match vectors.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => return Err(AppError::Index("Embedding vector is empty".to_string())),
            None => return Err(AppError::Index("Cannot build an empty index".to_string())),
        };

        let mut entries = Vec::with_capacity(chunks.len());
        for (i, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            if vector.len() != dimensions {
                return Err(AppError::Index(format!(
                    "Vector {} has {} dimensions, expected {}",
                    i,
                    vector.len(),
                    dimensions
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(AppError::Index(format!(
                    "Vector {} contains a non-finite value",
                    i
                )));
            }

            entries.push(IndexEntry {
                id: uuid::Uuid::new_v4().to_string(),
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                position: chunk.position,
                metadata: chunk.metadata.clone(),
                embedding: vector,
            });
        }

        Ok(Self {
            dimensions,
            embedding,
            created_at: Utc::now(),
            entries,
        })
    }

    /// Append every entry of `other`, keeping existing entries first.
    ///
    /// Either all of `other` is merged or `self` is left untouched.
    pub fn merge_from(&mut self, other: FlatIndex) -> AppResult<()> {
        if other.dimensions != self.dimensions {
            return Err(AppError::Index(format!(
                "Cannot merge a {}-dimension partition into a {}-dimension index",
                other.dimensions, self.dimensions
            )));
        }

        let existing: HashSet<&str> = self.entries.iter().map(|e| e.id.as_str()).collect();
        if let Some(dup) = other.entries.iter().find(|e| existing.contains(e.id.as_str())) {
            return Err(AppError::Index(format!(
                "Duplicate entry id '{}' in merged partition",
                dup.id
            )));
        }

        self.entries.extend(other.entries);
        Ok(())
    }

    /// Return the `top_k` entries most similar to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(AppError::Index(format!(
                "Query has {} dimensions but the index was built with {} ({}/{})",
                query.len(),
                self.dimensions,
                self.embedding.provider,
                self.embedding.model
            )));
        }

        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry, cosine_similarity(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        tracing::debug!(
            "Retrieved {} entries (requested top-{})",
            scored.len(),
            top_k
        );

        Ok(scored
            .into_iter()
            .map(|(entry, score)| SearchHit {
                id: entry.id.clone(),
                text: entry.text.clone(),
                source: entry.source.clone(),
                position: entry.position,
                metadata: entry.metadata.clone(),
                score,
            })
            .collect())
    }

    /// Write the index to `<dir>/index.sqlite`, replacing any previous one.
    pub fn persist(&self, dir: &Path) -> AppResult<PathBuf> {
        store::write(self, dir)
    }

    /// Read an index previously written by [`FlatIndex::persist`].
    pub fn load(dir: &Path) -> AppResult<Self> {
        store::read(dir)
    }

    /// Summarize the index persisted at `dir`.
    pub fn stats(&self, dir: &Path) -> IndexStats {
        let sources: HashSet<&str> = self.entries.iter().map(|e| e.source.as_str()).collect();
        let size_bytes = std::fs::metadata(dir.join(INDEX_FILE))
            .map(|m| m.len())
            .unwrap_or(0);

        IndexStats {
            path: dir.display().to_string(),
            entries: self.entries.len(),
            sources: sources.len(),
            dimensions: self.dimensions,
            embedding_provider: self.embedding.provider.clone(),
            embedding_model: self.embedding.model.clone(),
            created_at: self.created_at,
            size_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embedding_model(&self) -> &EmbeddingModel {
        &self.embedding
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> EmbeddingModel {
        EmbeddingModel::new("trigram", "trigram-v1")
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new(*t, format!("https://docs.example.com/{}", i), 0))
            .collect()
    }

    #[test]
    fn test_build_keeps_provenance() {
        let index = FlatIndex::build(
            &chunks(&["alpha", "beta"]),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            model(),
        )
        .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.dimensions(), 2);
        assert_eq!(index.entries()[1].text, "beta");
        assert_eq!(index.entries()[1].source, "https://docs.example.com/1");
        assert_ne!(index.entries()[0].id, index.entries()[1].id);
    }

    #[test]
    fn test_build_rejects_count_mismatch() {
        let result = FlatIndex::build(&chunks(&["a", "b"]), vec![vec![1.0]], model());
        assert!(matches!(result, Err(AppError::Index(_))));
    }

    #[test]
    fn test_build_rejects_empty_and_ragged() {
        assert!(FlatIndex::build(&[], vec![], model()).is_err());
        assert!(FlatIndex::build(&chunks(&["a"]), vec![vec![]], model()).is_err());
        assert!(FlatIndex::build(
            &chunks(&["a", "b"]),
            vec![vec![1.0, 0.0], vec![1.0]],
            model()
        )
        .is_err());
    }

    #[test]
    fn test_build_rejects_nan() {
        let result = FlatIndex::build(&chunks(&["a"]), vec![vec![f32::NAN, 1.0]], model());
        assert!(result.unwrap_err().to_string().contains("non-finite"));
    }

    #[test]
    fn test_merge_appends_in_order() {
        let mut first =
            FlatIndex::build(&chunks(&["a"]), vec![vec![1.0, 0.0]], model()).unwrap();
        let second = FlatIndex::build(&chunks(&["b", "c"]), vec![vec![0.0, 1.0]; 2], model())
            .unwrap();

        first.merge_from(second).unwrap();
        let texts: Vec<&str> = first.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = FlatIndex::build(
            &[
                Chunk::new("ops", "https://docs.example.com/ops", 0),
                Chunk::new("cost", "https://docs.example.com/cost", 0),
            ],
            vec![vec![1.0, 0.0], vec![0.5, 0.5]],
            model(),
        )
        .unwrap();
        let b = FlatIndex::build(
            &[Chunk::new("security", "https://docs.example.com/security", 3)],
            vec![vec![0.0, 1.0]],
            model(),
        )
        .unwrap();

        let mut ab = a.clone();
        ab.merge_from(b.clone()).unwrap();
        let mut ba = b;
        ba.merge_from(a).unwrap();

        let keyed = |index: &FlatIndex| {
            let mut keys: Vec<(String, String, u32)> = index
                .entries()
                .iter()
                .map(|e| (e.text.clone(), e.source.clone(), e.position))
                .collect();
            keys.sort();
            keys
        };
        assert_eq!(ab.len(), 3);
        assert_eq!(keyed(&ab), keyed(&ba));
    }

    #[test]
    fn test_merge_dimension_mismatch_leaves_index_untouched() {
        let mut first =
            FlatIndex::build(&chunks(&["a"]), vec![vec![1.0, 0.0]], model()).unwrap();
        let other = FlatIndex::build(&chunks(&["b"]), vec![vec![1.0, 0.0, 0.0]], model()).unwrap();

        assert!(first.merge_from(other).is_err());
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_merge_duplicate_ids_rejected() {
        let mut first =
            FlatIndex::build(&chunks(&["a"]), vec![vec![1.0, 0.0]], model()).unwrap();
        let copy = first.clone();

        assert!(first
            .merge_from(copy)
            .unwrap_err()
            .to_string()
            .contains("Duplicate"));
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_search_orders_by_score() {
        let index = FlatIndex::build(
            &chunks(&["east", "north", "northeast"]),
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            model(),
        )
        .unwrap();

        let hits = index.search(&[0.0, 1.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "north");
        assert_eq!(hits[1].text, "northeast");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = FlatIndex::build(&chunks(&["a"]), vec![vec![1.0, 0.0]], model()).unwrap();
        assert!(matches!(index.search(&[1.0], 4), Err(AppError::Index(_))));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
