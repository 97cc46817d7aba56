//! Exporter metrics
//!
//! Thin wrappers over the `metrics` facade so every crate reports under the
//! same names and labels. Without an installed recorder they are no-ops.
//!
//! | name | kind | labels |
//! |------|------|--------|
//! | `otlp_exporter_exports_total` | counter | signal, transport, status |
//! | `otlp_exporter_records_total` | counter | signal, transport |
//! | `otlp_exporter_export_latency_ms` | histogram | signal |
//! | `otlp_exporter_lifecycle_events_total` | counter | transport, event |
//! | `otlp_exporter_spans_dropped_total` | counter | processor |
//! | `otlp_exporter_collections_total` | counter | |
//! | `otlp_exporter_last_collection_records` | gauge | |

use std::collections::HashMap;
use std::fmt;

use metrics::{counter, gauge, histogram};

/// One upload attempt. `records` only counts toward the records total when
/// the upload succeeded.
pub fn record_export(signal: &str, transport: &str, records: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "otlp_exporter_exports_total",
        "signal" => signal.to_string(),
        "transport" => transport.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        counter!(
            "otlp_exporter_records_total",
            "signal" => signal.to_string(),
            "transport" => transport.to_string()
        )
        .increment(records as u64);
    }
}

pub fn record_export_latency_ms(signal: &str, latency_ms: f64) {
    histogram!("otlp_exporter_export_latency_ms", "signal" => signal.to_string())
        .record(latency_ms);
}

/// `event` is one of "start", "start_failed", "stop", "stop_failed"
pub fn record_lifecycle(transport: &str, event: &'static str) {
    counter!(
        "otlp_exporter_lifecycle_events_total",
        "transport" => transport.to_string(),
        "event" => event
    )
    .increment(1);
}

/// Spans refused by a processor (queue full or already shut down)
pub fn record_spans_dropped(processor: &str, count: u64) {
    counter!(
        "otlp_exporter_spans_dropped_total",
        "processor" => processor.to_string()
    )
    .increment(count);
}

pub fn record_collection(records: usize) {
    counter!("otlp_exporter_collections_total").increment(1);
    gauge!("otlp_exporter_last_collection_records").set(records as f64);
}

/// In-process tally of export calls, for end-of-run reports
#[derive(Debug, Clone, Default)]
pub struct ExportStatsAggregator {
    pub total_exports: u64,
    pub failed_exports: u64,
    /// Records carried by successful exports
    pub total_records: u64,
    pub latency: LatencyStats,
    pub exports_by_signal: HashMap<String, u64>,
}

impl ExportStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, signal: &str, records: usize, latency_ms: f64, success: bool) {
        self.total_exports += 1;
        *self
            .exports_by_signal
            .entry(signal.to_string())
            .or_default() += 1;

        if success {
            self.total_records += records as u64;
        } else {
            self.failed_exports += 1;
        }
        self.latency.push(latency_ms);
    }

    pub fn summary(&self) -> ExportSummary {
        let failure_rate = if self.total_exports == 0 {
            0.0
        } else {
            self.failed_exports as f64 * 100.0 / self.total_exports as f64
        };
        ExportSummary {
            total_exports: self.total_exports,
            failed_exports: self.failed_exports,
            total_records: self.total_records,
            failure_rate,
            latency_ms: self.latency.summary(),
            exports_by_signal: self.exports_by_signal.clone(),
        }
    }
}

/// Snapshot of [`ExportStatsAggregator`]
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub total_exports: u64,
    pub failed_exports: u64,
    pub total_records: u64,
    /// Percentage of failed exports
    pub failure_rate: f64,
    pub latency_ms: LatencySummary,
    pub exports_by_signal: HashMap<String, u64>,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Export Summary ===")?;
        writeln!(
            f,
            "Exports: {} ({} failed, {:.2}%)",
            self.total_exports, self.failed_exports, self.failure_rate
        )?;
        writeln!(f, "Records exported: {}", self.total_records)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;

        let mut signals: Vec<_> = self.exports_by_signal.iter().collect();
        signals.sort();
        for (signal, count) in signals {
            writeln!(f, "  {signal}: {count}")?;
        }
        Ok(())
    }
}

/// Latency samples kept for percentile reporting
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    samples: Vec<f64>,
}

impl LatencyStats {
    pub fn push(&mut self, value: f64) {
        self.samples.push(value);
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Nearest-rank percentile, `q` in `0.0..=1.0`
    pub fn percentile(&self, q: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        let rank = (q.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.saturating_sub(1)])
    }

    pub fn summary(&self) -> LatencySummary {
        if self.samples.is_empty() {
            return LatencySummary::default();
        }
        let sum: f64 = self.samples.iter().sum();
        LatencySummary {
            count: self.count(),
            mean: sum / self.count() as f64,
            p50: self.percentile(0.5).unwrap_or_default(),
            p99: self.percentile(0.99).unwrap_or_default(),
            max: self.percentile(1.0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p99: f64,
    pub max: f64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return f.write_str("n/a");
        }
        write!(
            f,
            "mean={:.3} p50={:.3} p99={:.3} max={:.3} (n={})",
            self.mean, self.p50, self.p99, self.max, self.count
        )
    }
}
