//! End-to-end runs of the batch indexer against a scripted embedder.

use super::doubles::ScriptedEmbedder;
use crate::index::{FlatIndex, INDEX_FILE};
use crate::indexer::{BatchIndexer, IndexerOptions};
use crate::progress::ProgressReporter;
use crate::types::Chunk;
use askwell_core::AppError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn chunks(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk::new(*t, format!("https://docs.example.com/page-{}", i), i as u32))
        .collect()
}

fn indexer(embedder: ScriptedEmbedder, batch_size: usize) -> (BatchIndexer, Arc<ScriptedEmbedder>) {
    let embedder = Arc::new(embedder);
    let indexer = BatchIndexer::new(
        embedder.clone(),
        IndexerOptions {
            batch_size,
            batch_timeout: None,
        },
    );
    (indexer, embedder)
}

fn texts(index: &FlatIndex) -> Vec<&str> {
    index.entries().iter().map(|e| e.text.as_str()).collect()
}

#[tokio::test]
async fn all_batches_succeed() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("local_index");
    let input = chunks(&["alpha", "bravo", "charlie", "delta", "echo"]);
    let (indexer, embedder) = indexer(ScriptedEmbedder::new(), 2);

    let report = indexer.run(&input, &dest).await.unwrap();

    assert_eq!(report.chunks_total, 5);
    assert_eq!(report.batches_total, 3);
    assert_eq!(report.batches_indexed, 3);
    assert_eq!(report.entries, 5);
    assert!(report.skipped.is_empty());
    assert_eq!(
        report.destination.as_deref(),
        Some(dest.join(INDEX_FILE).display().to_string().as_str())
    );
    assert_eq!(embedder.calls().len(), 3);

    let index = FlatIndex::load(&dest).unwrap();
    assert_eq!(texts(&index), vec!["alpha", "bravo", "charlie", "delta", "echo"]);
    for (entry, chunk) in index.entries().iter().zip(&input) {
        assert_eq!(entry.source, chunk.source);
        assert_eq!(entry.position, chunk.position);
    }
}

#[tokio::test]
async fn middle_batch_failure_is_skipped() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("idx");
    let (indexer, embedder) = indexer(ScriptedEmbedder::new().failing_on("B"), 1);

    let report = indexer.run(&chunks(&["A", "B", "C"]), &dest).await.unwrap();

    assert_eq!(report.batches_total, 3);
    assert_eq!(report.batches_indexed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].batch, 1);
    assert_eq!(report.skipped[0].start, 1);
    assert_eq!(report.skipped[0].len, 1);
    assert!(report.skipped[0].error.contains("embedding failed"));

    // Every batch was attempted, in order, exactly once.
    assert_eq!(
        embedder.calls(),
        vec![vec!["A".to_string()], vec!["B".to_string()], vec!["C".to_string()]]
    );

    let index = FlatIndex::load(&dest).unwrap();
    assert_eq!(texts(&index), vec!["A", "C"]);
}

#[tokio::test]
async fn first_batch_failure_later_success_seeds_index() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("idx");
    let (indexer, _) = indexer(ScriptedEmbedder::new().failing_on("A"), 1);

    let report = indexer.run(&chunks(&["A", "B", "C"]), &dest).await.unwrap();

    assert_eq!(report.skipped[0].batch, 0);
    assert_eq!(texts(&FlatIndex::load(&dest).unwrap()), vec!["B", "C"]);
}

#[tokio::test]
async fn failed_batch_drops_all_of_its_chunks() {
    let (indexer, _) = indexer(ScriptedEmbedder::new().failing_on("c"), 2);

    let build = indexer
        .build(&chunks(&["a", "b", "c", "d", "e"]))
        .await
        .unwrap();

    assert_eq!(texts(&build.index), vec!["a", "b", "e"]);
    assert_eq!(build.report.chunks_skipped(), 2);
    assert_eq!(build.report.skipped[0].start, 2);
}

#[tokio::test]
async fn every_batch_failing_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("idx");
    let (indexer, _) = indexer(
        ScriptedEmbedder::new().failing_on("one").failing_on("two"),
        1,
    );

    let err = indexer
        .run(&chunks(&["one", "two"]), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AllBatchesFailed { batches: 2 }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn all_failed_keeps_previous_index() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("idx");

    let (good, _) = indexer(ScriptedEmbedder::new(), 1);
    good.run(&chunks(&["kept"]), &dest).await.unwrap();

    let (bad, _) = indexer(ScriptedEmbedder::new().failing_on("lost"), 1);
    assert!(bad.run(&chunks(&["lost"]), &dest).await.is_err());

    assert_eq!(texts(&FlatIndex::load(&dest).unwrap()), vec!["kept"]);
}

#[tokio::test]
async fn dimension_mismatch_partition_is_skipped() {
    let (indexer, _) = indexer(ScriptedEmbedder::new().widening("wide"), 1);

    let build = indexer
        .build(&chunks(&["narrow", "wide", "narrow too"]))
        .await
        .unwrap();

    assert_eq!(texts(&build.index), vec!["narrow", "narrow too"]);
    assert_eq!(build.report.skipped.len(), 1);
    assert!(build.report.skipped[0].error.contains("index build failed"));
}

#[tokio::test]
async fn ragged_batch_fails_to_build() {
    let (indexer, _) = indexer(ScriptedEmbedder::new().widening("wide"), 2);

    let build = indexer
        .build(&chunks(&["left", "wide", "right"]))
        .await
        .unwrap();

    assert_eq!(texts(&build.index), vec!["right"]);
    assert!(build.report.skipped[0].error.contains("index build failed"));
}

#[tokio::test]
async fn short_vector_count_is_an_embedding_failure() {
    let (indexer, _) = indexer(ScriptedEmbedder::new().short_count(), 2);

    let err = indexer.build(&chunks(&["a", "b"])).await.unwrap_err();
    assert!(matches!(err, AppError::AllBatchesFailed { batches: 1 }));
}

#[tokio::test(start_paused = true)]
async fn timed_out_batch_is_skipped() {
    let embedder = Arc::new(ScriptedEmbedder::new().slow_on("slow", Duration::from_secs(60)));
    let indexer = BatchIndexer::new(
        embedder,
        IndexerOptions {
            batch_size: 1,
            batch_timeout: Some(Duration::from_secs(5)),
        },
    );

    let build = indexer
        .build(&chunks(&["fast", "slow", "quick"]))
        .await
        .unwrap();

    assert_eq!(texts(&build.index), vec!["fast", "quick"]);
    assert!(build.report.skipped[0].error.contains("timed out"));
}

#[tokio::test]
async fn merge_order_does_not_change_entry_set() {
    let (forward, _) = indexer(ScriptedEmbedder::new(), 1);
    let (reverse, _) = indexer(ScriptedEmbedder::new(), 1);
    let input = chunks(&["x", "y", "z"]);
    let mut reversed = input.clone();
    reversed.reverse();

    let a = forward.build(&input).await.unwrap().index;
    let b = reverse.build(&reversed).await.unwrap().index;

    let mut left: Vec<(&str, &str)> = a
        .entries()
        .iter()
        .map(|e| (e.text.as_str(), e.source.as_str()))
        .collect();
    let mut right: Vec<(&str, &str)> = b
        .entries()
        .iter()
        .map(|e| (e.text.as_str(), e.source.as_str()))
        .collect();
    left.sort();
    right.sort();
    assert_eq!(left, right);
}

#[tokio::test]
async fn empty_input_and_zero_batch_size_rejected() {
    let (one, embedder) = indexer(ScriptedEmbedder::new(), 1);
    assert!(matches!(
        one.build(&[]).await.unwrap_err(),
        AppError::Ingest(_)
    ));
    assert!(embedder.calls().is_empty());

    let (zero, _) = indexer(ScriptedEmbedder::new(), 0);
    assert!(matches!(
        zero.build(&chunks(&["a"])).await.unwrap_err(),
        AppError::Config(_)
    ));
}

#[tokio::test]
async fn persistence_failure_is_fatal() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    let (indexer, _) = indexer(ScriptedEmbedder::new(), 1);

    let err = indexer.run(&chunks(&["a"]), &blocker).await.unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));
}

#[tokio::test]
async fn progress_reports_each_batch_then_persist() {
    let temp = TempDir::new().unwrap();
    let phases = Arc::new(Mutex::new(Vec::new()));
    let sink = phases.clone();
    let progress = ProgressReporter::new(Arc::new(move |event| {
        sink.lock()
            .unwrap()
            .push(format!("{}:{}", event.phase, event.message));
    }));

    let (indexer, _) = indexer(ScriptedEmbedder::new().failing_on("b"), 1);
    let indexer = indexer.with_progress(progress);
    indexer
        .run(&chunks(&["a", "b"]), &temp.path().join("idx"))
        .await
        .unwrap();

    let phases = phases.lock().unwrap();
    assert_eq!(phases[0], "embed:indexed");
    assert_eq!(phases[1], "embed:skipped");
    assert!(phases[2].starts_with("persist:"));
}
