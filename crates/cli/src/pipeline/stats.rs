//! Pipeline statistics and metrics.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use contracts::{
    MetricClient, ResourceMetrics, ResourceSpans, TraceClient, Transport, TransportError,
};
use observability::{ExportStatsAggregator, ExportSummary};

/// Export statistics shared by every recording client of a run
pub type SharedStats = Arc<Mutex<ExportStatsAggregator>>;

/// Client wrapper feeding every upload into a [`SharedStats`]
pub struct RecordingClient<C> {
    inner: C,
    stats: SharedStats,
}

impl<C> RecordingClient<C> {
    pub fn new(inner: C, stats: SharedStats) -> Self {
        Self { inner, stats }
    }

    fn record(&self, signal: &str, records: usize, started: Instant, success: bool) {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(signal, records, latency_ms, success);
    }
}

impl<C: Transport> Transport for RecordingClient<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.inner.stop().await
    }
}

impl<C: TraceClient> TraceClient for RecordingClient<C> {
    async fn upload_traces(&self, records: Vec<ResourceSpans>) -> Result<(), TransportError> {
        let spans = records.iter().map(ResourceSpans::span_count).sum();
        let started = Instant::now();
        let result = self.inner.upload_traces(records).await;
        self.record("traces", spans, started, result.is_ok());
        result
    }
}

impl<C: MetricClient> MetricClient for RecordingClient<C> {
    async fn upload_metrics(&self, records: Vec<ResourceMetrics>) -> Result<(), TransportError> {
        let metrics = records.iter().map(ResourceMetrics::metric_count).sum();
        let started = Instant::now();
        let result = self.inner.upload_metrics(records).await;
        self.record("metrics", metrics, started, result.is_ok());
        result
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Simulated requests handled
    pub requests: u64,

    /// Spans created by the workload
    pub spans_started: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Errors returned while shutting the pipelines down
    pub shutdown_errors: Vec<String>,

    /// Upload statistics across both signals
    pub exports: ExportSummary,
}

impl PipelineStats {
    /// Simulated requests per second
    pub fn request_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.requests as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Requests: {}", self.requests);
        println!("   ├─ Spans started: {}", self.spans_started);
        println!("   └─ Request rate: {:.2}/s", self.request_rate());

        println!("\n{}", self.exports);

        if !self.shutdown_errors.is_empty() {
            println!("Shutdown errors");
            for error in &self.shutdown_errors {
                println!("   ├─ {}", error);
            }
        }

        println!();
    }
}
