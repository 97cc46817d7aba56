//! TraceExporter - span exporter over a [`TraceClient`]

use std::time::Instant;

use tracing::{debug, instrument};

use contracts::{ExportError, SpanData, SpanExporter, TraceClient};

use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::transform;

/// Exports span batches through a client it starts and stops exactly once
pub struct TraceExporter<C> {
    client: C,
    lifecycle: Lifecycle,
}

impl<C: TraceClient> TraceExporter<C> {
    /// Create and start the exporter; fails if the client fails to start
    pub async fn new(client: C) -> Result<Self, ExportError> {
        let exporter = Self::new_unstarted(client);
        exporter.start().await?;
        Ok(exporter)
    }

    /// Create the exporter without starting the client
    pub fn new_unstarted(client: C) -> Self {
        let lifecycle = Lifecycle::new(client.name());
        Self { client, lifecycle }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Start the client. Only the first call reaches the client; every other
    /// call waits for it and returns [`ExportError::AlreadyStarted`].
    #[instrument(name = "trace_exporter_start", skip(self), fields(transport = %self.client.name()))]
    pub async fn start(&self) -> Result<(), ExportError> {
        let client = &self.client;
        self.lifecycle.start(move || client.start()).await
    }

    /// Stop the client if it was ever started. Concurrent callers share the
    /// result of the single stop.
    #[instrument(name = "trace_exporter_shutdown", skip(self), fields(transport = %self.client.name()))]
    pub async fn shutdown(&self) -> Result<(), ExportError> {
        let client = &self.client;
        self.lifecycle.shutdown(move || client.stop()).await
    }

    /// Transform and upload a batch. Empty batches, and batches with no
    /// exportable span, succeed without reaching the client.
    pub async fn export_spans(&self, batch: &[SpanData]) -> Result<(), ExportError> {
        if batch.is_empty() {
            return Ok(());
        }
        let records = transform::spans(batch);
        if records.is_empty() {
            debug!(spans = batch.len(), "No exportable spans in batch");
            return Ok(());
        }

        let span_count: usize = records.iter().map(|r| r.span_count()).sum();
        let started = Instant::now();
        let result = self.client.upload_traces(records).await;

        observability::record_export("traces", self.client.name(), span_count, result.is_ok());
        observability::record_export_latency_ms("traces", started.elapsed().as_secs_f64() * 1000.0);
        result.map_err(ExportError::from)
    }
}

impl<C: TraceClient> SpanExporter for TraceExporter<C> {
    async fn export_spans(&self, batch: &[SpanData]) -> Result<(), ExportError> {
        TraceExporter::export_spans(self, batch).await
    }

    async fn shutdown(&self) -> Result<(), ExportError> {
        TraceExporter::shutdown(self).await
    }
}
