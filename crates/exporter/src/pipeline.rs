//! Pipeline composition
//!
//! `new_*` functions build a started exporter and wrap it in the SDK
//! component that drives it. `install_*` additionally registers the result
//! process-wide; nothing else in this crate touches global state.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use contracts::{
    BatchConfig, ExportError, MetricClient, MetricPipelineConfig, Resource, TraceClient,
};
use sdk::metrics::{
    AggregatorSelector, BasicController, ExplicitHistogram, InexpensiveDistribution,
    DEFAULT_COLLECT_PERIOD, DEFAULT_COLLECT_TIMEOUT,
};
use sdk::trace::TracerProvider;
use sdk::SdkError;

use crate::metric::{MetricExporter, MetricExporterOptions};
use crate::trace::TraceExporter;

/// Trace pipeline settings
#[derive(Debug, Clone)]
pub struct TracePipelineOptions {
    pub resource: Resource,
    pub batch: BatchConfig,
}

impl Default for TracePipelineOptions {
    fn default() -> Self {
        Self {
            resource: Resource::empty(),
            batch: BatchConfig::default(),
        }
    }
}

/// Push controller settings for the metric pipeline
#[derive(Clone)]
pub struct ControllerOptions {
    pub resource: Resource,
    pub collect_period: Duration,
    pub collect_timeout: Duration,
    pub aggregator_selector: Arc<dyn AggregatorSelector>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            resource: Resource::empty(),
            collect_period: DEFAULT_COLLECT_PERIOD,
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
            aggregator_selector: Arc::new(InexpensiveDistribution),
        }
    }
}

impl ControllerOptions {
    /// Settings from the metric section of the telemetry config
    pub fn from_config(config: &MetricPipelineConfig, resource: Resource) -> Self {
        let aggregator_selector: Arc<dyn AggregatorSelector> = match &config.histogram_boundaries {
            Some(boundaries) => Arc::new(ExplicitHistogram::new(boundaries.clone())),
            None => Arc::new(InexpensiveDistribution),
        };
        Self {
            resource,
            collect_period: config.collect_period(),
            collect_timeout: config.collect_timeout(),
            aggregator_selector,
        }
    }
}

/// Start a trace exporter and put it behind a batch span processor
///
/// Must run inside a tokio runtime (the processor spawns its worker).
pub async fn new_trace_pipeline<C>(
    client: C,
    options: TracePipelineOptions,
) -> Result<(Arc<TraceExporter<C>>, TracerProvider), ExportError>
where
    C: TraceClient + 'static,
{
    let exporter = Arc::new(TraceExporter::new(client).await?);
    let provider = TracerProvider::builder()
        .with_resource(options.resource)
        .with_batch_exporter(Arc::clone(&exporter), options.batch)
        .build();
    Ok((exporter, provider))
}

/// [`new_trace_pipeline`], then register the provider globally
pub async fn install_trace_pipeline<C>(
    client: C,
    options: TracePipelineOptions,
) -> Result<(Arc<TraceExporter<C>>, TracerProvider), ExportError>
where
    C: TraceClient + 'static,
{
    let (exporter, provider) = new_trace_pipeline(client, options).await?;
    if sdk::global::set_tracer_provider(provider.clone()).is_some() {
        info!("Replaced global tracer provider");
    }
    Ok((exporter, provider))
}

/// Start a metric exporter and put it behind a push controller
///
/// The exporter is also the controller's export kind selector, so the
/// processor computes exactly the temporality the exporter will ask for.
pub async fn new_metric_pipeline<C>(
    client: C,
    options: MetricExporterOptions,
    controller: ControllerOptions,
) -> Result<(Arc<MetricExporter<C>>, BasicController<MetricExporter<C>>), ExportError>
where
    C: MetricClient + 'static,
{
    let exporter = Arc::new(MetricExporter::new(client, options).await?);
    let controller = BasicController::builder(Arc::clone(&exporter), exporter.clone())
        .with_resource(controller.resource)
        .with_aggregator_selector(controller.aggregator_selector)
        .with_collect_period(controller.collect_period)
        .with_collect_timeout(controller.collect_timeout)
        .build();
    Ok((exporter, controller))
}

/// [`new_metric_pipeline`], then start the controller's collection loop
pub async fn install_metric_pipeline<C>(
    client: C,
    options: MetricExporterOptions,
    controller: ControllerOptions,
) -> Result<(Arc<MetricExporter<C>>, BasicController<MetricExporter<C>>), SdkError>
where
    C: MetricClient + 'static,
{
    let (exporter, controller) = new_metric_pipeline(client, options, controller).await?;
    controller.start().await?;
    Ok((exporter, controller))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InMemoryClient;
    use crate::LifecycleState;
    use contracts::{DeltaExportKindSelector, ExportKindConfig, KeyValue, TransportError};

    fn fast_batch() -> BatchConfig {
        BatchConfig {
            max_queue_size: 64,
            max_export_batch_size: 16,
            scheduled_delay_ms: 50,
            export_timeout_ms: 1000,
        }
    }

    #[tokio::test]
    async fn test_trace_pipeline_exports_on_shutdown() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let options = TracePipelineOptions {
            resource: Resource::new([KeyValue::new("service.name", "svc")]),
            batch: fast_batch(),
        };
        let (exporter, provider) = new_trace_pipeline(client, options).await.unwrap();
        assert_eq!(exporter.state().await, LifecycleState::Started);

        let tracer = provider.tracer("pipeline-test");
        tracer.start("a").end();
        tracer.start("b").end();
        provider.shutdown().await.unwrap();

        let spans: usize = handle
            .trace_uploads()
            .iter()
            .flatten()
            .map(|rs| rs.span_count())
            .sum();
        assert_eq!(spans, 2);
        assert_eq!(handle.stop_count(), 1);
        assert_eq!(exporter.state().await, LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_trace_pipeline_fails_when_client_fails() {
        let client =
            InMemoryClient::new("mem").fail_start(TransportError::connection("mem", "refused"));
        let err = new_trace_pipeline(client, TracePipelineOptions::default())
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            ExportError::Transport(TransportError::connection("mem", "refused"))
        );
    }

    #[tokio::test]
    async fn test_metric_pipeline_uses_exporter_temporality() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let options = MetricExporterOptions::new()
            .with_export_kind_selector(Arc::new(DeltaExportKindSelector));
        let (exporter, controller) =
            new_metric_pipeline(client, options, ControllerOptions::default())
                .await
                .unwrap();

        let counter = controller.meter("pipeline-test").counter("requests");
        counter.add(2.0, &[]);
        controller.collect_and_export().await.unwrap();
        counter.add(3.0, &[]);
        controller.collect_and_export().await.unwrap();

        let values: Vec<_> = handle
            .metrics()
            .into_iter()
            .map(|m| match m.data {
                contracts::MetricData::Sum { data_points, .. } => data_points[0].value,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                contracts::NumberValue::AsDouble(2.0),
                contracts::NumberValue::AsDouble(3.0)
            ]
        );

        exporter.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_install_metric_pipeline_starts_controller() {
        let config = MetricPipelineConfig {
            collect_period_ms: 20,
            export_kind: ExportKindConfig::Cumulative,
            ..MetricPipelineConfig::default()
        };
        let (_exporter, controller) = install_metric_pipeline(
            InMemoryClient::new("mem"),
            MetricExporterOptions::new(),
            ControllerOptions::from_config(&config, Resource::empty()),
        )
        .await
        .unwrap();

        assert!(controller.is_running().await);
        assert!(matches!(
            controller.start().await,
            Err(SdkError::ControllerAlreadyStarted)
        ));
        controller.stop().await.unwrap();
        assert_eq!(controller.exporter().client().stop_count(), 1);
    }
}
