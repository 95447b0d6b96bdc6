//! Batched index construction that tolerates per-batch failures.
//!
//! Chunks are cut into consecutive batches of `batch_size`. Each batch is
//! embedded and turned into a [`FlatIndex`] partition. A batch that fails to
//! embed or to build is logged and skipped; nothing is retried. The first
//! partition that succeeds becomes the accumulated index and every later one
//! is merged into it. The accumulated index is persisted once, after the last
//! batch. If no batch succeeds the run fails with
//! [`AppError::AllBatchesFailed`] and nothing is written.

use crate::embeddings::EmbeddingProvider;
use crate::index::{EmbeddingModel, FlatIndex};
use crate::progress::ProgressReporter;
use crate::types::Chunk;
use askwell_core::config::IngestSettings;
use askwell_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a single batch was skipped.
///
/// Never escapes the indexer; a skipped batch is recorded in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("index build failed: {0}")]
    IndexBuild(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerOptions {
    /// Chunks per embedding request; must be at least 1
    pub batch_size: usize,
    /// Deadline for embedding one batch
    pub batch_timeout: Option<Duration>,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            batch_timeout: None,
        }
    }
}

impl IndexerOptions {
    pub fn from_settings(settings: &IngestSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            batch_timeout: settings.batch_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// A batch that produced no partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedBatch {
    /// Zero-based batch number
    pub batch: usize,
    /// Index of the batch's first chunk in the input
    pub start: usize,
    pub len: usize,
    pub error: String,
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexRunReport {
    pub chunks_total: usize,
    pub batches_total: usize,
    pub batches_indexed: usize,
    /// Entries in the accumulated index
    pub entries: usize,
    pub skipped: Vec<SkippedBatch>,
    /// Artifact path, set once the index is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub duration_secs: f64,
}

impl IndexRunReport {
    pub fn chunks_skipped(&self) -> usize {
        self.skipped.iter().map(|s| s.len).sum()
    }
}

/// An accumulated index that has not been persisted yet.
#[derive(Debug)]
pub struct IndexBuild {
    pub index: FlatIndex,
    pub report: IndexRunReport,
}

/// Split `chunks` into consecutive slices of `batch_size`.
///
/// Order-preserving and exhaustive; only the last slice may be shorter.
pub fn partition(chunks: &[Chunk], batch_size: usize) -> AppResult<Vec<&[Chunk]>> {
    if batch_size == 0 {
        return Err(AppError::Config(
            "Batch size must be at least 1".to_string(),
        ));
    }
    Ok(chunks.chunks(batch_size).collect())
}

/// Builds and persists a [`FlatIndex`] batch by batch.
pub struct BatchIndexer {
    provider: Arc<dyn EmbeddingProvider>,
    options: IndexerOptions,
    progress: ProgressReporter,
}

impl BatchIndexer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: IndexerOptions) -> Self {
        Self {
            provider,
            options,
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Embed and accumulate every batch without writing anything.
    pub async fn build(&self, chunks: &[Chunk]) -> AppResult<IndexBuild> {
        if chunks.is_empty() {
            return Err(AppError::Ingest("No chunks to index".to_string()));
        }

        let start_time = Instant::now();
        let batches = partition(chunks, self.options.batch_size)?;
        let batches_total = batches.len();

        info!(
            chunks = chunks.len(),
            batches = batches_total,
            batch_size = self.options.batch_size,
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            "Indexing chunks"
        );

        let mut accumulated: Option<FlatIndex> = None;
        let mut skipped = Vec::new();
        let mut start = 0;

        for (batch_no, batch) in batches.into_iter().enumerate() {
            let outcome = match self.process_batch(batch).await {
                Ok(partition) => absorb(&mut accumulated, partition),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    debug!(batch = batch_no, start, len = batch.len(), "Batch indexed");
                    self.progress
                        .embed(batch_no as u64 + 1, batches_total as u64, "indexed");
                }
                Err(e) => {
                    warn!(
                        batch = batch_no,
                        start,
                        len = batch.len(),
                        error = %e,
                        "Skipping batch"
                    );
                    self.progress
                        .embed(batch_no as u64 + 1, batches_total as u64, "skipped");
                    skipped.push(SkippedBatch {
                        batch: batch_no,
                        start,
                        len: batch.len(),
                        error: e.to_string(),
                    });
                }
            }

            start += batch.len();
        }

        let index = match accumulated {
            Some(index) => index,
            None => {
                error!(batches = batches_total, "Every batch failed; nothing to persist");
                return Err(AppError::AllBatchesFailed {
                    batches: batches_total,
                });
            }
        };

        let report = IndexRunReport {
            chunks_total: chunks.len(),
            batches_total,
            batches_indexed: batches_total - skipped.len(),
            entries: index.len(),
            skipped,
            destination: None,
            duration_secs: start_time.elapsed().as_secs_f64(),
        };

        Ok(IndexBuild { index, report })
    }

    /// Build the index and persist it under `dest`.
    pub async fn run(&self, chunks: &[Chunk], dest: &Path) -> AppResult<IndexRunReport> {
        let start_time = Instant::now();
        let IndexBuild { index, mut report } = self.build(chunks).await?;

        self.progress
            .persist(index.len(), &dest.display().to_string());
        let path = index.persist(dest)?;

        report.destination = Some(path.display().to_string());
        report.duration_secs = start_time.elapsed().as_secs_f64();

        info!(
            entries = report.entries,
            batches_indexed = report.batches_indexed,
            batches_skipped = report.skipped.len(),
            destination = %path.display(),
            "Index written in {:.2}s",
            report.duration_secs
        );

        Ok(report)
    }

    async fn process_batch(&self, batch: &[Chunk]) -> Result<FlatIndex, BatchError> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let request = self.provider.embed_batch(&texts);

        let vectors = match self.options.batch_timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.map_err(|_| {
                BatchError::Embedding(format!("timed out after {}ms", limit.as_millis()))
            })?,
            None => request.await,
        }
        .map_err(|e| BatchError::Embedding(e.to_string()))?;

        if vectors.len() != batch.len() {
            return Err(BatchError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }

        let model = EmbeddingModel::new(self.provider.provider_name(), self.provider.model_name());
        FlatIndex::build(batch, vectors, model).map_err(|e| BatchError::IndexBuild(e.to_string()))
    }
}

/// First successful partition seeds the accumulator; later ones merge in.
fn absorb(accumulated: &mut Option<FlatIndex>, partition: FlatIndex) -> Result<(), BatchError> {
    match accumulated {
        Some(index) => index
            .merge_from(partition)
            .map_err(|e| BatchError::IndexBuild(e.to_string())),
        None => {
            *accumulated = Some(partition);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk::new(format!("chunk {}", i), "notes.md", i as u32))
            .collect()
    }

    #[test]
    fn test_partition_is_exhaustive_and_ordered() {
        let input = chunks(7);
        for size in 1..=8 {
            let batches = partition(&input, size).unwrap();
            assert_eq!(batches.len(), (7 + size - 1) / size);
            assert!(batches[..batches.len() - 1].iter().all(|b| b.len() == size));

            let flattened: Vec<&Chunk> = batches.iter().flat_map(|b| b.iter()).collect();
            let expected: Vec<&Chunk> = input.iter().collect();
            assert_eq!(flattened, expected);
        }
    }

    #[test]
    fn test_partition_rejects_zero() {
        assert!(matches!(partition(&chunks(2), 0), Err(AppError::Config(_))));
    }

    #[test]
    fn test_partition_empty_input() {
        assert!(partition(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn test_options_from_settings() {
        let settings = IngestSettings {
            batch_size: 16,
            batch_timeout_secs: Some(30),
            ..IngestSettings::default()
        };
        let options = IndexerOptions::from_settings(&settings);
        assert_eq!(options.batch_size, 16);
        assert_eq!(options.batch_timeout, Some(Duration::from_secs(30)));
        assert_eq!(IndexerOptions::default().batch_size, 1);
    }

    #[test]
    fn test_chunks_skipped() {
        let report = IndexRunReport {
            skipped: vec![
                SkippedBatch {
                    batch: 0,
                    start: 0,
                    len: 2,
                    error: "x".to_string(),
                },
                SkippedBatch {
                    batch: 3,
                    start: 6,
                    len: 1,
                    error: "y".to_string(),
                },
            ],
            ..IndexRunReport::default()
        };
        assert_eq!(report.chunks_skipped(), 3);
    }
}
