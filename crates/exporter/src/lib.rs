//! # Exporter
//!
//! OTLP exporter core: start/stop lifecycle around a transport client, the
//! trace and metric exporters built on it, the wire transform, pipeline
//! composition and the bundled clients.
//!
//! ## Lifecycle
//!
//! ```text
//! Fresh ──start──▶ Started ──shutdown──▶ Stopped
//! ```
//!
//! Shutdown of an exporter that never started is a no-op and leaves it
//! Fresh. A failed start still counts as started, so a later shutdown calls
//! the client's stop.
//!
//! Start and stop each reach the client at most once, no matter how many
//! tasks race to call them. Every concurrent shutdown caller receives the
//! result of the single stop.
//!
//! ## Usage
//!
//! ```ignore
//! let (exporter, provider) =
//!     new_trace_pipeline(LogClient::new("otlp"), TracePipelineOptions::default()).await?;
//! provider.tracer("checkout").start("charge").end();
//! provider.shutdown().await?;
//! ```

pub mod clients;
mod gate;
mod lifecycle;
pub mod metric;
pub mod pipeline;
pub mod trace;
pub mod transform;

pub use clients::{AnyClient, FileClient, InMemoryClient, LogClient, UdpClient};
pub use lifecycle::LifecycleState;
pub use metric::{MetricExporter, MetricExporterOptions};
pub use pipeline::{
    install_metric_pipeline, install_trace_pipeline, new_metric_pipeline, new_trace_pipeline,
    ControllerOptions, TracePipelineOptions,
};
pub use trace::TraceExporter;
