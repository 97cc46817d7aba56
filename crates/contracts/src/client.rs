//! Transport (Client) contract
//!
//! A client connects to and disconnects from a collector and transmits
//! already-encoded wire records. Exporters call it through these traits only.

use std::future::Future;

use crate::{ResourceMetrics, ResourceSpans, TransportError};

/// Connection lifecycle shared by every client
pub trait Transport: Send + Sync {
    /// Client name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Establish connection(s) to the endpoint.
    ///
    /// Called at most once by an exporter, so implementations need not be
    /// idempotent.
    fn start(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection(s).
    ///
    /// Called at most once by an exporter, but may run concurrently with
    /// uploads. When the future resolves the teardown must be complete.
    fn stop(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Client able to ship trace records
pub trait TraceClient: Transport {
    /// Send encoded spans. May be called concurrently, and after `stop`, in
    /// which case the client rejects the upload.
    fn upload_traces(
        &self,
        records: Vec<ResourceSpans>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Client able to ship metric records
pub trait MetricClient: Transport {
    /// Send encoded metrics. May be called concurrently, and after `stop`, in
    /// which case the client rejects the upload.
    fn upload_metrics(
        &self,
        records: Vec<ResourceMetrics>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
