//! MetricExporter - checkpoint exporter over a [`MetricClient`]

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use contracts::{
    AggregationKind, CheckpointExporter, CheckpointSet, CumulativeExportKindSelector, Descriptor,
    ExportError, ExportKind, ExportKindSelector, MetricClient,
};

use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::transform;

/// Parallelism handed to the checkpoint transform
const TRANSFORM_WORKERS: usize = 1;

/// Construction options for [`MetricExporter`]
#[derive(Clone)]
pub struct MetricExporterOptions {
    export_kind_selector: Arc<dyn ExportKindSelector>,
}

impl Default for MetricExporterOptions {
    /// Cumulative export kind for every instrument
    fn default() -> Self {
        Self {
            export_kind_selector: Arc::new(CumulativeExportKindSelector),
        }
    }
}

impl MetricExporterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Temporality policy used by both the exporter and, through it, the
    /// aggregation processor
    pub fn with_export_kind_selector(mut self, selector: Arc<dyn ExportKindSelector>) -> Self {
        self.export_kind_selector = selector;
        self
    }
}

/// Exports metric checkpoints through a client it starts and stops exactly
/// once
pub struct MetricExporter<C> {
    client: C,
    export_kind_selector: Arc<dyn ExportKindSelector>,
    lifecycle: Lifecycle,
}

impl<C: MetricClient> MetricExporter<C> {
    /// Create and start the exporter; fails if the client fails to start
    pub async fn new(client: C, options: MetricExporterOptions) -> Result<Self, ExportError> {
        let exporter = Self::new_unstarted(client, options);
        exporter.start().await?;
        Ok(exporter)
    }

    /// Create the exporter without starting the client
    pub fn new_unstarted(client: C, options: MetricExporterOptions) -> Self {
        let lifecycle = Lifecycle::new(client.name());
        Self {
            client,
            export_kind_selector: options.export_kind_selector,
            lifecycle,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Start the client. Only the first call reaches the client; every other
    /// call waits for it and returns [`ExportError::AlreadyStarted`].
    #[instrument(name = "metric_exporter_start", skip(self), fields(transport = %self.client.name()))]
    pub async fn start(&self) -> Result<(), ExportError> {
        let client = &self.client;
        self.lifecycle.start(move || client.start()).await
    }

    /// Stop the client if it was ever started. Concurrent callers share the
    /// result of the single stop.
    #[instrument(name = "metric_exporter_shutdown", skip(self), fields(transport = %self.client.name()))]
    pub async fn shutdown(&self) -> Result<(), ExportError> {
        let client = &self.client;
        self.lifecycle.shutdown(move || client.stop()).await
    }

    /// Transform the checkpoint using this exporter's temporality policy and
    /// upload it. Transform errors are returned before the client is called;
    /// an empty result succeeds without reaching the client.
    pub async fn export(&self, checkpoint: &dyn CheckpointSet) -> Result<(), ExportError> {
        let records = transform::checkpoint_set(self, checkpoint, TRANSFORM_WORKERS)?;
        if records.is_empty() {
            debug!("No metric records in checkpoint");
            return Ok(());
        }

        let metric_count: usize = records.iter().map(|r| r.metric_count()).sum();
        let started = Instant::now();
        let result = self.client.upload_metrics(records).await;

        observability::record_export("metrics", self.client.name(), metric_count, result.is_ok());
        observability::record_export_latency_ms("metrics", started.elapsed().as_secs_f64() * 1000.0);
        result.map_err(ExportError::from)
    }
}

impl<C: MetricClient> ExportKindSelector for MetricExporter<C> {
    fn export_kind_for(&self, descriptor: &Descriptor, aggregation: AggregationKind) -> ExportKind {
        self.export_kind_selector.export_kind_for(descriptor, aggregation)
    }
}

impl<C: MetricClient> CheckpointExporter for MetricExporter<C> {
    async fn export(&self, checkpoint: &dyn CheckpointSet) -> Result<(), ExportError> {
        MetricExporter::export(self, checkpoint).await
    }

    async fn shutdown(&self) -> Result<(), ExportError> {
        MetricExporter::shutdown(self).await
    }
}
