use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload activity.
#[derive(Default)]
pub struct UploadMetrics {
    uploads_processed: AtomicU64,
    labels_detected: AtomicU64,
    failures: AtomicU64,
}

impl UploadMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an indexed upload and the number of labels detected for it.
    pub fn record_upload(&self, label_count: u64) {
        self.uploads_processed.fetch_add(1, Ordering::Relaxed);
        self.labels_detected
            .fetch_add(label_count, Ordering::Relaxed);
    }

    /// Record a request that ended in an error.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_processed: self.uploads_processed.load(Ordering::Relaxed),
            labels_detected: self.labels_detected.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of upload counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Uploads that completed the whole pipeline since startup.
    pub uploads_processed: u64,
    /// Total labels detected across all completed uploads.
    pub labels_detected: u64,
    /// Requests that failed at any stage.
    pub failures: u64,
}
