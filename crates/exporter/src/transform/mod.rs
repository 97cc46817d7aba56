//! In-memory telemetry → wire records
//!
//! Pure functions; exporters treat them as a black box between the pipeline
//! and the client.

mod metrics;
mod spans;

pub use metrics::checkpoint_set;
pub use spans::spans;
