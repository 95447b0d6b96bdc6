//! Ingestion driver: sources to documents to chunks to a persisted index.

use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::indexer::{BatchIndexer, IndexerOptions};
use crate::loader::{self, LoadOutcome, WebLoader};
use crate::progress::ProgressReporter;
use crate::splitter::DocumentSplitter;
use crate::types::{IngestStats, SourceKind};
use askwell_core::{AppConfig, AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// What to ingest and where to put it.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Index name (resolved under `.askwell/indexes/`) or absolute path
    pub index: String,
    /// Sitemap files or URLs whose `<loc>` entries are fetched
    pub sitemaps: Vec<String>,
    /// Extra page URLs
    pub urls: Vec<String>,
    /// Local files or directories
    pub paths: Vec<PathBuf>,
}

impl IngestOptions {
    fn has_sources(&self) -> bool {
        !(self.sitemaps.is_empty() && self.urls.is_empty() && self.paths.is_empty())
    }
}

/// Run a full ingestion with the embedding provider named in `config`.
pub async fn ingest(
    config: &AppConfig,
    options: IngestOptions,
    progress: ProgressReporter,
) -> AppResult<IngestStats> {
    let provider = create_provider(&config.embedding, config.embedding_api_key().as_deref())?;
    ingest_with(config, provider, options, progress).await
}

/// Run a full ingestion with an explicit embedding provider.
pub async fn ingest_with(
    config: &AppConfig,
    provider: Arc<dyn EmbeddingProvider>,
    options: IngestOptions,
    progress: ProgressReporter,
) -> AppResult<IngestStats> {
    let start = Instant::now();

    if options.index.trim().is_empty() {
        return Err(AppError::Config("An index name is required".to_string()));
    }
    if !options.has_sources() {
        return Err(AppError::Ingest(
            "Nothing to ingest: give at least one sitemap, URL or path".to_string(),
        ));
    }

    // Fail on bad chunking settings before any network traffic.
    let splitter =
        DocumentSplitter::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;
    let indexer = BatchIndexer::new(provider, IndexerOptions::from_settings(&config.ingest))
        .with_progress(progress.clone());
    let destination = config.index_path(&options.index);

    tracing::info!(
        index = %options.index,
        destination = %destination.display(),
        "Starting ingest"
    );

    let mut loaded = LoadOutcome::default();

    let mut urls: Vec<String> = Vec::new();
    if !options.sitemaps.is_empty() || !options.urls.is_empty() {
        let web = WebLoader::new(&config.ingest.user_agent)?;

        let sitemaps_total = options.sitemaps.len() as u64;
        for (i, sitemap) in options.sitemaps.iter().enumerate() {
            progress.sitemap(i as u64 + 1, Some(sitemaps_total), sitemap);
            for url in loader::read_sitemap(sitemap, web.client()).await? {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        for url in &options.urls {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }

        loaded.extend(web.load_all(&urls, &progress).await);
    }

    for path in &options.paths {
        loaded.extend(loader::load_path(path, &progress)?);
    }

    let pages_loaded = loaded
        .documents
        .iter()
        .filter(|d| d.kind == SourceKind::Web)
        .count();
    let files_loaded = loaded.documents.len() - pages_loaded;
    let pages_failed = loaded
        .failed
        .iter()
        .filter(|(source, _)| urls.contains(source))
        .count();
    let bytes_processed: u64 = loaded.documents.iter().map(|d| d.text.len() as u64).sum();

    let mut chunks = Vec::new();
    let documents_total = loaded.documents.len() as u64;
    for (i, document) in loaded.documents.iter().enumerate() {
        chunks.extend(splitter.split(document));
        progress.split(i as u64 + 1, Some(documents_total), chunks.len());
    }

    if chunks.is_empty() {
        return Err(AppError::Ingest(format!(
            "No text to index ({} sources loaded, {} skipped)",
            loaded.documents.len(),
            loaded.failed.len()
        )));
    }

    tracing::info!(
        documents = loaded.documents.len(),
        skipped = loaded.failed.len(),
        chunks = chunks.len(),
        "Split documents"
    );

    let index_run = indexer.run(&chunks, &destination).await?;

    Ok(IngestStats {
        index: options.index,
        urls_total: urls.len(),
        pages_loaded,
        pages_failed,
        files_loaded,
        chunks_total: chunks.len(),
        bytes_processed,
        index_run,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}
