//! SpanProcessor - hook between the tracer and exporters

use async_trait::async_trait;
use contracts::SpanData;

use crate::error::SdkError;

/// Receives every span ended by a tracer of the owning provider
#[async_trait]
pub trait SpanProcessor: Send + Sync {
    /// Processor name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Called synchronously from `Span::end`; must not block.
    fn on_end(&self, span: SpanData);

    /// Export everything buffered so far
    async fn force_flush(&self) -> Result<(), SdkError>;

    /// Flush, then release the exporter. Later calls fail.
    async fn shutdown(&self) -> Result<(), SdkError>;
}
