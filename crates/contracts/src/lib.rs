//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the
//! in-memory telemetry model, the wire records handed to transports, the
//! transport (Client) contract and the exporter contracts consumed by the
//! processing pipeline.
//!
//! Business crates depend on this crate only; reverse dependencies are
//! prohibited.
//!
//! ## Time Model
//! - All timestamps are `SystemTime`; wire records carry nanoseconds since the
//!   Unix epoch.

mod attribute;
mod checkpoint;
mod client;
mod config;
mod error;
mod export_kind;
mod exporter;
mod metric;
mod span;
mod wire;

pub use attribute::*;
pub use checkpoint::CheckpointSet;
pub use client::{MetricClient, TraceClient, Transport};
pub use config::*;
pub use error::*;
pub use export_kind::*;
pub use exporter::{CheckpointExporter, LocalCheckpointExporter, LocalSpanExporter, SpanExporter};
pub use metric::*;
pub use span::*;
pub use wire::*;
