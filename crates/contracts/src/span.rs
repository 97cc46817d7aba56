//! SpanData - Tracer output
//!
//! Completed, read-only span records handed to span processors and exporters.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::{InstrumentationScope, KeyValue, Resource};

/// 16-byte trace identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TraceId(pub [u8; 16]);

impl TraceId {
    pub const INVALID: TraceId = TraceId([0; 16]);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// 8-byte span identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpanId(pub [u8; 8]);

impl SpanId {
    pub const INVALID: SpanId = SpanId([0; 8]);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Identity of a span within a trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampled: bool,
}

impl SpanContext {
    /// Both identifiers are non-zero
    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }
}

/// Span kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpanKind {
    #[default]
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// Span status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Unset,
    Ok,
    Error { description: String },
}

/// Timestamped annotation on a span
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub timestamp: SystemTime,
    pub attributes: Vec<KeyValue>,
}

/// Completed span
///
/// Immutable once produced by `Span::end`.
#[derive(Debug, Clone)]
pub struct SpanData {
    /// Identity of this span
    pub span_context: SpanContext,

    /// Parent span id (`SpanId::INVALID` for roots)
    pub parent_span_id: SpanId,

    /// Operation name
    pub name: String,

    pub kind: SpanKind,

    pub start_time: SystemTime,

    pub end_time: SystemTime,

    pub attributes: Vec<KeyValue>,

    pub events: Vec<Event>,

    pub status: Status,

    /// Attributes discarded by span limits
    pub dropped_attributes_count: u32,

    /// Resource of the provider that created the span
    pub resource: Arc<Resource>,

    /// Tracer scope that created the span
    pub scope: InstrumentationScope,
}
