//! # SDK
//!
//! In-process telemetry producers feeding the exporters:
//!
//! - [`trace`]: `TracerProvider` → `Tracer` → `Span`, ended spans flow through
//!   `SpanProcessor`s (usually a `BatchSpanProcessor`) into a `SpanExporter`.
//! - [`metrics`]: `Meter` instruments record into an `Accumulator`; the
//!   `BasicController` periodically collects, applies temporality and hands a
//!   `CheckpointSet` to a `CheckpointExporter`.
//! - [`global`]: process-wide tracer provider.

mod error;
pub mod global;
pub mod metrics;
pub mod trace;

pub use error::SdkError;
