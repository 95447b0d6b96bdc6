//! Structured progress reporting for ingestion.
//!
//! Ingestion runs through the phases `sitemap`, `load`, `split`, `embed` and
//! `persist`. Each emits [`ProgressEvent`]s through an optional callback.

use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted during ingestion.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: String,

    /// Current progress (pages loaded, batches embedded, etc.)
    pub current: u64,

    /// Total expected work (if known)
    pub total: Option<u64>,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: Option<f64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            phase: phase.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        let pct = self
            .percentage
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress reporter that emits events through a callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Arc<Instant>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// Create a no-op reporter (no events emitted).
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let event = event.with_elapsed(elapsed);

            tracing::debug!(
                phase = %event.phase,
                current = event.current,
                total = ?event.total,
                message = %event.message,
                elapsed_secs = elapsed,
                "Progress event"
            );

            callback(event);
        }
    }

    pub fn sitemap(&self, current: u64, total: Option<u64>, location: &str) {
        self.emit(ProgressEvent::new(
            "sitemap",
            current,
            total,
            format!("reading {}", location),
        ));
    }

    pub fn load(&self, current: u64, total: Option<u64>, source: &str) {
        self.emit(ProgressEvent::new(
            "load",
            current,
            total,
            format!("loaded {}", source),
        ));
    }

    pub fn split(&self, current: u64, total: Option<u64>, chunks_created: usize) {
        self.emit(ProgressEvent::new(
            "split",
            current,
            total,
            format!("{} chunks created", chunks_created),
        ));
    }

    /// One event per attempted batch, successful or skipped.
    pub fn embed(&self, batch: u64, total: u64, outcome: &str) {
        self.emit(ProgressEvent::new(
            "embed",
            batch,
            Some(total),
            outcome.to_string(),
        ));
    }

    pub fn persist(&self, entries: usize, destination: &str) {
        self.emit(ProgressEvent::new(
            "persist",
            entries as u64,
            None,
            format!("writing {}", destination),
        ));
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent::new("embed", 5, Some(10), "batch indexed");
        assert_eq!(event.format_simple(), "[embed] 5/10 (50%) - batch indexed");
    }

    #[test]
    fn test_progress_event_without_total() {
        let event = ProgressEvent::new("persist", 42, None, "writing idx");
        assert_eq!(event.format_simple(), "[persist] 42 - writing idx");
    }

    #[test]
    fn test_progress_reporter_emit() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.load(3, Some(10), "https://docs.example.com/a");
        reporter.embed(1, 2, "skipped");

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, "load");
        assert_eq!(captured[0].current, 3);
        assert_eq!(captured[1].phase, "embed");
        assert!(captured[1].elapsed_secs.is_some());
    }

    #[test]
    fn test_noop_reporter() {
        let reporter = ProgressReporter::noop();
        reporter.split(1, None, 4);
    }
}
