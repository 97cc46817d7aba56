//! Tracing SDK: provider, tracer, spans and span processors

mod batch;
mod metrics;
mod processor;
mod provider;

pub use batch::BatchSpanProcessor;
pub use metrics::{MetricsSnapshot, ProcessorMetrics};
pub use processor::SpanProcessor;
pub use provider::{Span, Tracer, TracerProvider, TracerProviderBuilder, DEFAULT_MAX_ATTRIBUTES};
