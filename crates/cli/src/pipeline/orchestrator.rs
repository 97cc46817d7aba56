//! Pipeline orchestrator - builds both export pipelines and drives a demo
//! workload through them until the deadline or a shutdown signal.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use contracts::{KeyValue, SpanKind, Status, TelemetryConfig};
use exporter::{
    install_metric_pipeline, install_trace_pipeline, AnyClient, ControllerOptions,
    MetricExporter, MetricExporterOptions, TracePipelineOptions,
};
use rand::Rng;
use sdk::metrics::{BasicController, Counter, Histogram, UpDownCounter};
use sdk::trace::{Tracer, TracerProvider};
use tracing::{debug, info, warn};

use super::stats::{RecordingClient, SharedStats};
use super::PipelineStats;

const INSTRUMENTATION_NAME: &str = "otlp-pipeline.demo";
const ROUTES: [&str; 4] = ["/checkout", "/cart", "/search", "/health"];

type Controller = BasicController<MetricExporter<RecordingClient<AnyClient>>>;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded telemetry configuration
    pub telemetry: TelemetryConfig,

    /// Run length (None = until shutdown signal)
    pub duration: Option<Duration>,

    /// Simulated requests per second
    pub rate: u32,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the deadline passes or `shutdown` resolves, then shut both
    /// pipelines down
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let telemetry = &self.config.telemetry;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let resource = telemetry.service.resource();
        let stats = SharedStats::default();

        let provider = if telemetry.traces.enabled {
            let client = self.client(&stats)?;
            let options = TracePipelineOptions {
                resource: resource.clone(),
                batch: telemetry.traces.batch.clone(),
            };
            let (_, provider) = install_trace_pipeline(client, options)
                .await
                .context("Failed to start trace pipeline")?;
            info!(
                transport = %telemetry.transport.name,
                batch_size = telemetry.traces.batch.max_export_batch_size,
                "Trace pipeline installed"
            );
            Some(provider)
        } else {
            info!("Trace pipeline disabled");
            None
        };

        let controller = if telemetry.metrics.enabled {
            let client = self.client(&stats)?;
            let options = MetricExporterOptions::new()
                .with_export_kind_selector(telemetry.metrics.export_kind.selector());
            let controller_options =
                ControllerOptions::from_config(&telemetry.metrics, resource.clone());
            let (_, controller) = install_metric_pipeline(client, options, controller_options)
                .await
                .context("Failed to start metric pipeline")?;
            info!(
                transport = %telemetry.transport.name,
                export_kind = ?telemetry.metrics.export_kind,
                period_ms = telemetry.metrics.collect_period_ms,
                "Metric pipeline installed"
            );
            Some(controller)
        } else {
            info!("Metric pipeline disabled");
            None
        };

        let tracer = match &provider {
            Some(provider) => provider.tracer(INSTRUMENTATION_NAME),
            None => sdk::global::tracer(INSTRUMENTATION_NAME),
        };
        let workload = Workload::new(tracer, controller.as_ref());
        let mut run_stats = self.drive(workload, shutdown).await;

        info!("Shutting down pipelines...");
        if let Some(provider) = provider {
            shutdown_traces(&provider, &mut run_stats).await;
        }
        if let Some(controller) = controller {
            shutdown_metrics(&controller, &mut run_stats).await;
        }

        run_stats.duration = start_time.elapsed();
        run_stats.exports = stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .summary();

        info!(
            duration_secs = run_stats.duration.as_secs_f64(),
            requests = run_stats.requests,
            exports = run_stats.exports.total_exports,
            "Pipeline shutdown complete"
        );

        Ok(run_stats)
    }

    fn client(&self, stats: &SharedStats) -> Result<RecordingClient<AnyClient>> {
        let client = AnyClient::from_config(&self.config.telemetry.transport)
            .context("Failed to build transport client")?;
        Ok(RecordingClient::new(client, Arc::clone(stats)))
    }

    /// Emit simulated requests at the configured rate
    async fn drive(&self, workload: Workload, shutdown: impl Future<Output = ()>) -> PipelineStats {
        let mut stats = PipelineStats::default();
        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.rate.max(1)));
        let mut ticker = tokio::time::interval(period);

        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        info!(rate = self.config.rate, duration = ?self.config.duration, "Workload running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping workload...");
                    break;
                }
                _ = &mut deadline => {
                    info!(requests = stats.requests, "Run duration reached");
                    break;
                }
                _ = ticker.tick() => {
                    stats.spans_started += workload.request(stats.requests);
                    stats.requests += 1;
                }
            }
        }

        stats
    }
}

async fn shutdown_traces(provider: &TracerProvider, stats: &mut PipelineStats) {
    if let Err(e) = provider.shutdown().await {
        warn!(error = %e, "Trace pipeline shutdown failed");
        stats.shutdown_errors.push(format!("traces: {e}"));
    }
    sdk::global::take_tracer_provider();
}

async fn shutdown_metrics(controller: &Controller, stats: &mut PipelineStats) {
    if let Err(e) = controller.stop().await {
        warn!(error = %e, "Metric pipeline shutdown failed");
        stats.shutdown_errors.push(format!("metrics: {e}"));
    }
}

/// Instruments the simulated service reports through
struct Workload {
    tracer: Tracer,
    instruments: Option<Instruments>,
}

struct Instruments {
    requests: Counter,
    latency: Histogram,
    in_flight: UpDownCounter,
}

impl Workload {
    fn new(tracer: Tracer, controller: Option<&Controller>) -> Self {
        let instruments = controller.map(|controller| {
            let meter = controller.meter(INSTRUMENTATION_NAME);
            let started = Instant::now();
            meter.value_observer("process.uptime", move |result| {
                result.observe(started.elapsed().as_secs_f64(), &[]);
            });
            Instruments {
                requests: meter.counter("http.server.requests"),
                latency: meter.histogram("http.server.duration"),
                in_flight: meter.up_down_counter("http.server.active_requests"),
            }
        });
        Self {
            tracer,
            instruments,
        }
    }

    /// Simulate one request; returns the number of spans started
    fn request(&self, seq: u64) -> u64 {
        let mut rng = rand::rng();
        let route = ROUTES[rng.random_range(0..ROUTES.len())];
        let latency_ms: f64 = rng.random_range(2.0..250.0);
        let failed = rng.random_ratio(1, 20);
        let attributes = [
            KeyValue::new("http.route", route),
            KeyValue::new("http.status_code", if failed { 500i64 } else { 200i64 }),
        ];

        if let Some(m) = &self.instruments {
            m.in_flight.add(1.0, &attributes[..1]);
        }

        let mut server = self
            .tracer
            .start_with_kind(format!("GET {route}"), SpanKind::Server);
        for attribute in attributes.iter().cloned() {
            server.set_attribute(attribute);
        }
        server.set_attribute(KeyValue::new("request.seq", seq as i64));

        let mut query = self.tracer.start_child("db.query", server.span_context());
        query.set_attribute(KeyValue::new("db.system", "postgresql"));
        let end = SystemTime::now() + Duration::from_secs_f64(latency_ms / 1000.0);
        query.end_with_timestamp(end - Duration::from_secs_f64(latency_ms / 2000.0));

        if failed {
            server.add_event("exception", vec![KeyValue::new("exception.type", "Timeout")]);
            server.set_status(Status::Error {
                description: "upstream timeout".into(),
            });
        } else {
            server.set_status(Status::Ok);
        }
        server.end_with_timestamp(end);

        if let Some(m) = &self.instruments {
            m.requests.add(1.0, &attributes);
            m.latency.record(latency_ms, &attributes[..1]);
            m.in_flight.add(-1.0, &attributes[..1]);
        }
        debug!(seq, route, latency_ms, failed, "Simulated request");
        2
    }
}
