use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing batch analysis activity.
#[derive(Default)]
pub struct PipelineMetrics {
    batches_processed: AtomicU64,
    files_analyzed: AtomicU64,
    files_failed: AtomicU64,
    fallback_results: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed batch along with its per-file outcome counts.
    pub fn record_batch(&self, analyzed: u64, failed: u64, fallback_results: u64) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.files_analyzed.fetch_add(analyzed, Ordering::Relaxed);
        self.files_failed.fetch_add(failed, Ordering::Relaxed);
        self.fallback_results
            .fetch_add(fallback_results, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            files_analyzed: self.files_analyzed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            fallback_results: self.fallback_results.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Number of batches that ran to completion since startup.
    pub batches_processed: u64,
    /// Files that were parsed and analyzed.
    pub files_analyzed: u64,
    /// Files that landed in a batch's error list.
    pub files_failed: u64,
    /// Metric results that degraded to a deterministic placeholder.
    pub fallback_results: u64,
}
