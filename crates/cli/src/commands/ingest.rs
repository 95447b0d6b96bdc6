//! Ingest command handler.
//!
//! Loads sitemaps, pages and local files into a named index. Batches that
//! fail to embed are reported and skipped; the run only fails when none of
//! them succeed.

use askwell_core::{AppConfig, AppResult};
use askwell_knowledge::{IngestOptions, IngestStats, ProgressEvent, ProgressReporter};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Build or rebuild an index from web pages and local files
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Index name (under .askwell/indexes) or absolute path
    #[arg(short, long)]
    pub index: String,

    /// Sitemap file or URL whose <loc> pages are fetched
    #[arg(long)]
    pub sitemap: Vec<String>,

    /// Page URL to fetch
    #[arg(long)]
    pub url: Vec<String>,

    /// Local file or directory
    #[arg(long)]
    pub path: Vec<PathBuf>,

    /// Chunks embedded per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum characters per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by neighbouring chunks
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Give up on a batch after this many seconds
    #[arg(long, value_name = "SECS")]
    pub batch_timeout: Option<u64>,

    /// Print progress lines to stderr
    #[arg(long)]
    pub progress: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for index '{}'", self.index);

        let config = self.apply_overrides(config)?;

        let progress = if self.progress {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple());
            }))
        } else {
            ProgressReporter::noop()
        };

        let options = IngestOptions {
            index: self.index.clone(),
            sitemaps: self.sitemap.clone(),
            urls: self.url.clone(),
            paths: self.path.clone(),
        };

        let stats = askwell_knowledge::ingest(&config, options, progress).await?;

        if self.json {
            return super::print_json(&stats);
        }

        print!("{}", render_summary(&stats));
        Ok(())
    }

    /// Command-line ingest settings win over the config file.
    fn apply_overrides(&self, config: &AppConfig) -> AppResult<AppConfig> {
        let mut config = config.clone();

        if let Some(batch_size) = self.batch_size {
            config.ingest.batch_size = batch_size;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.ingest.chunk_size = chunk_size;
        }
        if let Some(chunk_overlap) = self.chunk_overlap {
            config.ingest.chunk_overlap = chunk_overlap;
        }
        if let Some(secs) = self.batch_timeout {
            config.ingest.batch_timeout_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

fn render_summary(stats: &IngestStats) -> String {
    let run = &stats.index_run;
    let mut out = format!(
        "Indexed {} of {} chunks into '{}' ({} of {} batches) in {:.2}s\n",
        run.entries,
        stats.chunks_total,
        stats.index,
        run.batches_indexed,
        run.batches_total,
        stats.duration_secs
    );

    if stats.urls_total > 0 {
        out.push_str(&format!(
            "  Pages: {} loaded, {} failed of {}\n",
            stats.pages_loaded, stats.pages_failed, stats.urls_total
        ));
    }
    if stats.files_loaded > 0 {
        out.push_str(&format!("  Files: {}\n", stats.files_loaded));
    }
    if let Some(destination) = &run.destination {
        out.push_str(&format!("  Written to {}\n", destination));
    }

    if !run.skipped.is_empty() {
        out.push_str(&format!(
            "  Skipped {} batches ({} chunks):\n",
            run.skipped.len(),
            run.chunks_skipped()
        ));
        for skipped in &run.skipped {
            out.push_str(&format!(
                "    batch {} (chunks {}..{}): {}\n",
                skipped.batch,
                skipped.start,
                skipped.start + skipped.len,
                skipped.error
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use askwell_knowledge::{IndexRunReport, SkippedBatch};

    fn command(args: &[&str]) -> IngestCommand {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            ingest: IngestCommand,
        }

        let mut argv = vec!["ingest"];
        argv.extend_from_slice(args);
        Wrapper::try_parse_from(argv).unwrap().ingest
    }

    fn stats(skipped: Vec<SkippedBatch>) -> IngestStats {
        IngestStats {
            index: "local_index".to_string(),
            urls_total: 3,
            pages_loaded: 2,
            pages_failed: 1,
            files_loaded: 0,
            chunks_total: 3,
            bytes_processed: 120,
            index_run: IndexRunReport {
                chunks_total: 3,
                batches_total: 3,
                batches_indexed: 3 - skipped.len(),
                entries: 3 - skipped.len(),
                skipped,
                destination: Some("/ws/.askwell/indexes/local_index/index.sqlite".to_string()),
                duration_secs: 0.4,
            },
            duration_secs: 1.25,
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cmd = command(&[
            "--index",
            "local_index",
            "--batch-size",
            "8",
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "50",
            "--batch-timeout",
            "30",
        ]);

        let config = cmd.apply_overrides(&AppConfig::default()).unwrap();
        assert_eq!(config.ingest.batch_size, 8);
        assert_eq!(config.ingest.chunk_size, 500);
        assert_eq!(config.ingest.chunk_overlap, 50);
        assert_eq!(config.ingest.batch_timeout_secs, Some(30));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let cmd = command(&["--index", "idx", "--batch-size", "0"]);
        assert!(cmd.apply_overrides(&AppConfig::default()).is_err());
    }

    #[test]
    fn test_repeated_sources() {
        let cmd = command(&[
            "--index",
            "idx",
            "--sitemap",
            "sitemap.xml",
            "--url",
            "https://a.example.com",
            "--url",
            "https://b.example.com",
            "--path",
            "docs",
        ]);
        assert_eq!(cmd.sitemap, vec!["sitemap.xml"]);
        assert_eq!(cmd.url.len(), 2);
        assert_eq!(cmd.path, vec![PathBuf::from("docs")]);
        assert!(!cmd.progress);
    }

    #[test]
    fn test_summary_lists_skipped_batches() {
        let summary = render_summary(&stats(vec![SkippedBatch {
            batch: 1,
            start: 1,
            len: 1,
            error: "embedding failed: connection refused".to_string(),
        }]));

        assert!(summary.starts_with("Indexed 2 of 3 chunks into 'local_index' (2 of 3 batches)"));
        assert!(summary.contains("Pages: 2 loaded, 1 failed of 3"));
        assert!(summary.contains("Skipped 1 batches (1 chunks):"));
        assert!(summary.contains("batch 1 (chunks 1..2): embedding failed: connection refused"));
    }

    #[test]
    fn test_summary_without_skips() {
        let summary = render_summary(&stats(Vec::new()));
        assert!(!summary.contains("Skipped"));
        assert!(summary.contains("Written to /ws/.askwell/indexes/local_index/index.sqlite"));
    }
}
