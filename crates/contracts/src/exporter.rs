//! Exporter traits - processing pipeline output interface
//!
//! The span processor and the metric controller drive exporters through these
//! traits.

use crate::{CheckpointSet, ExportError, SpanData};

/// Span batch exporter
#[trait_variant::make(SpanExporter: Send)]
pub trait LocalSpanExporter {
    /// Export a batch of completed spans
    ///
    /// # Errors
    /// Returns the transport or transform error unchanged
    async fn export_spans(&self, batch: &[SpanData]) -> Result<(), ExportError>;

    /// Release the exporter's transport
    async fn shutdown(&self) -> Result<(), ExportError>;
}

/// Metric checkpoint exporter
#[trait_variant::make(CheckpointExporter: Send)]
pub trait LocalCheckpointExporter {
    /// Export a checkpoint snapshot
    async fn export(&self, checkpoint: &dyn CheckpointSet) -> Result<(), ExportError>;

    /// Release the exporter's transport
    async fn shutdown(&self) -> Result<(), ExportError>;
}
