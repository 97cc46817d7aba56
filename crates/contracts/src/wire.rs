//! Wire records
//!
//! Already-encoded OTLP-shaped records handed to transports. Field names
//! follow the OTLP/JSON mapping.

use serde::{Deserialize, Serialize};

use crate::{InstrumentationScope, KeyValue, Resource};

// ===== Traces =====

/// Spans grouped by resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    pub resource: Resource,
    pub scope_spans: Vec<ScopeSpans>,
}

impl ResourceSpans {
    /// Number of spans across all scopes
    pub fn span_count(&self) -> usize {
        self.scope_spans.iter().map(|s| s.spans.len()).sum()
    }
}

/// Spans grouped by instrumentation scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSpans {
    pub scope: InstrumentationScope,
    pub spans: Vec<SpanRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireSpanKind {
    SpanKindInternal,
    SpanKindServer,
    SpanKindClient,
    SpanKindProducer,
    SpanKindConsumer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    StatusCodeUnset,
    StatusCodeOk,
    StatusCodeError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub code: StatusCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub name: String,
    pub time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
}

/// Encoded span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    /// 32 hex chars
    pub trace_id: String,
    /// 16 hex chars
    pub span_id: String,
    /// Empty for root spans
    pub parent_span_id: String,
    pub name: String,
    pub kind: WireSpanKind,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
    pub events: Vec<EventRecord>,
    pub status: StatusRecord,
}

// ===== Metrics =====

/// Metrics grouped by resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub resource: Resource,
    pub scope_metrics: Vec<ScopeMetrics>,
}

impl ResourceMetrics {
    /// Number of metrics across all scopes
    pub fn metric_count(&self) -> usize {
        self.scope_metrics.iter().map(|s| s.metrics.len()).sum()
    }
}

/// Metrics grouped by instrumentation scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMetrics {
    pub scope: InstrumentationScope,
    pub metrics: Vec<MetricRecord>,
}

/// Encoded metric stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub data: MetricData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationTemporality {
    AggregationTemporalityDelta,
    AggregationTemporalityCumulative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricData {
    Sum {
        #[serde(rename = "dataPoints")]
        data_points: Vec<NumberDataPoint>,
        #[serde(rename = "aggregationTemporality")]
        aggregation_temporality: AggregationTemporality,
        #[serde(rename = "isMonotonic")]
        is_monotonic: bool,
    },
    Gauge {
        #[serde(rename = "dataPoints")]
        data_points: Vec<NumberDataPoint>,
    },
    Histogram {
        #[serde(rename = "dataPoints")]
        data_points: Vec<HistogramDataPoint>,
        #[serde(rename = "aggregationTemporality")]
        aggregation_temporality: AggregationTemporality,
    },
    Summary {
        #[serde(rename = "dataPoints")]
        data_points: Vec<SummaryDataPoint>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumberValue {
    #[serde(rename = "asInt")]
    AsInt(i64),
    #[serde(rename = "asDouble")]
    AsDouble(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberDataPoint {
    pub attributes: Vec<KeyValue>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub value: NumberValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramDataPoint {
    pub attributes: Vec<KeyValue>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub count: u64,
    pub sum: f64,
    pub bucket_counts: Vec<u64>,
    pub explicit_bounds: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAtQuantile {
    pub quantile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDataPoint {
    pub attributes: Vec<KeyValue>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub count: u64,
    pub sum: f64,
    pub quantile_values: Vec<ValueAtQuantile>,
}
