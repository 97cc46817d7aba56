//! TelemetryConfig - Config Loader output
//!
//! Describes the service identity, the transport, and the trace and metric
//! pipeline settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::{
    CumulativeExportKindSelector, DeltaExportKindSelector, ExportKindSelector, KeyValue, Resource,
    StatelessExportKindSelector,
};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TelemetryConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Service identity
    #[validate(nested)]
    pub service: ServiceConfig,

    /// Transport the exporters ship records through
    pub transport: TransportConfig,

    /// Trace pipeline
    #[serde(default)]
    #[validate(nested)]
    pub traces: TracePipelineConfig,

    /// Metric pipeline
    #[serde(default)]
    #[validate(nested)]
    pub metrics: MetricPipelineConfig,
}

/// Service identity, turned into the pipeline resource
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    /// `service.name`
    #[validate(length(min = 1))]
    pub name: String,

    /// `service.version`
    #[serde(default)]
    pub version: Option<String>,

    /// `deployment.environment`
    #[serde(default)]
    pub environment: Option<String>,

    /// Extra resource attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ServiceConfig {
    /// Build the resource describing this service
    pub fn resource(&self) -> Resource {
        let mut attributes = vec![KeyValue::new("service.name", self.name.clone())];
        if let Some(version) = &self.version {
            attributes.push(KeyValue::new("service.version", version.clone()));
        }
        if let Some(environment) = &self.environment {
            attributes.push(KeyValue::new("deployment.environment", environment.clone()));
        }
        attributes.extend(
            self.attributes
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
        );
        Resource::new(attributes)
    }
}

/// Transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Log record summaries via tracing
    Log,
    /// Append JSON lines to files
    File,
    /// Send datagrams over UDP
    Udp,
    /// Keep records in memory
    Memory,
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport name (used for logging/metrics)
    #[serde(default = "default_transport_name")]
    pub name: String,

    pub kind: TransportKind,

    /// Transport-specific parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_transport_name() -> String {
    "otlp".to_string()
}

/// Trace pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TracePipelineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub batch: BatchConfig,
}

impl Default for TracePipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch: BatchConfig::default(),
        }
    }
}

/// Batch span processor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchConfig {
    /// Spans buffered before new ones are dropped
    #[serde(default = "default_max_queue_size")]
    #[validate(range(min = 1))]
    pub max_queue_size: usize,

    /// Spans per export call
    #[serde(default = "default_max_export_batch_size")]
    #[validate(range(min = 1))]
    pub max_export_batch_size: usize,

    /// Delay between scheduled exports
    #[serde(default = "default_scheduled_delay_ms")]
    #[validate(range(min = 1))]
    pub scheduled_delay_ms: u64,

    /// Deadline for a single export call
    #[serde(default = "default_export_timeout_ms")]
    #[validate(range(min = 1))]
    pub export_timeout_ms: u64,
}

impl BatchConfig {
    pub fn scheduled_delay(&self) -> Duration {
        Duration::from_millis(self.scheduled_delay_ms)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_export_batch_size: default_max_export_batch_size(),
            scheduled_delay_ms: default_scheduled_delay_ms(),
            export_timeout_ms: default_export_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_queue_size() -> usize {
    2048
}

fn default_max_export_batch_size() -> usize {
    512
}

fn default_scheduled_delay_ms() -> u64 {
    5000
}

fn default_export_timeout_ms() -> u64 {
    30000
}

/// Metric pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetricPipelineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between collections when the controller is started
    #[serde(default = "default_collect_period_ms")]
    #[validate(range(min = 1))]
    pub collect_period_ms: u64,

    /// Deadline for one collect + export cycle
    #[serde(default = "default_collect_timeout_ms")]
    #[validate(range(min = 1))]
    pub collect_timeout_ms: u64,

    /// Temporality policy
    #[serde(default)]
    pub export_kind: ExportKindConfig,

    /// Explicit histogram bucket bounds (None = min/max/sum/count)
    #[serde(default)]
    pub histogram_boundaries: Option<Vec<f64>>,
}

impl MetricPipelineConfig {
    pub fn collect_period(&self) -> Duration {
        Duration::from_millis(self.collect_period_ms)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }
}

impl Default for MetricPipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collect_period_ms: default_collect_period_ms(),
            collect_timeout_ms: default_collect_timeout_ms(),
            export_kind: ExportKindConfig::default(),
            histogram_boundaries: None,
        }
    }
}

fn default_collect_period_ms() -> u64 {
    10000
}

fn default_collect_timeout_ms() -> u64 {
    10000
}

/// Named export kind selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKindConfig {
    #[default]
    Cumulative,
    Delta,
    Stateless,
}

impl ExportKindConfig {
    /// Selector implementing this policy
    pub fn selector(&self) -> Arc<dyn ExportKindSelector> {
        match self {
            ExportKindConfig::Cumulative => Arc::new(CumulativeExportKindSelector),
            ExportKindConfig::Delta => Arc::new(DeltaExportKindSelector),
            ExportKindConfig::Stateless => Arc::new(StatelessExportKindSelector),
        }
    }
}
