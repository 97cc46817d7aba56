//! Batch processor metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single span processor
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Spans handed to the exporter successfully
    exported_count: AtomicU64,
    /// Failed export calls
    failure_count: AtomicU64,
    /// Spans dropped because the queue was full or closed
    dropped_count: AtomicU64,
}

impl ProcessorMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get exported span count
    pub fn exported_count(&self) -> u64 {
        self.exported_count.load(Ordering::Relaxed)
    }

    /// Add to exported span count
    pub fn add_exported(&self, spans: u64) {
        self.exported_count.fetch_add(spans, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get dropped count
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Increment dropped count
    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            exported_count: self.exported_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of processor metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub exported_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}
