//! # Integration Tests
//!
//! Cross-crate tests:
//! - exporter lifecycle under concurrent callers
//! - export short-circuits and transport errors
//! - end-to-end pipelines from a loaded configuration

#[cfg(test)]
fn span(name: &str) -> contracts::SpanData {
    use contracts::{InstrumentationScope, Resource, SpanContext, SpanId, TraceId};
    use std::sync::Arc;
    use std::time::SystemTime;

    contracts::SpanData {
        span_context: SpanContext {
            trace_id: TraceId([3; 16]),
            span_id: SpanId([5; 8]),
            sampled: true,
        },
        parent_span_id: SpanId::INVALID,
        name: name.to_string(),
        kind: Default::default(),
        start_time: SystemTime::now(),
        end_time: SystemTime::now(),
        attributes: Vec::new(),
        events: Vec::new(),
        status: Default::default(),
        dropped_attributes_count: 0,
        resource: Arc::new(Resource::empty()),
        scope: InstrumentationScope::new("integration"),
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use std::future::Future;
    use std::sync::Arc;
    use std::task::Poll;
    use std::time::Duration;

    use tokio::sync::{mpsc, Notify};

    use contracts::{ExportError, TransportError};
    use exporter::{
        InMemoryClient, LifecycleState, MetricExporter, MetricExporterOptions, TraceExporter,
    };

    /// Start once, start again, then two concurrent shutdowns
    #[tokio::test]
    async fn test_start_twice_then_concurrent_shutdown() {
        let stop_error = TransportError::connection("mem", "collector gone");
        let client = InMemoryClient::new("mem")
            .fail_stop(stop_error.clone())
            .with_stop_delay(Duration::from_millis(20));
        let handle = client.clone();
        let exporter = Arc::new(TraceExporter::new_unstarted(client));

        assert_eq!(exporter.start().await, Ok(()));
        assert_eq!(handle.start_count(), 1);

        assert_eq!(exporter.start().await, Err(ExportError::AlreadyStarted));
        assert_eq!(handle.start_count(), 1);

        let (first, second) = tokio::join!(exporter.shutdown(), exporter.shutdown());
        let expected = Err(ExportError::Transport(stop_error));
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert_eq!(handle.stop_count(), 1);
        assert_eq!(exporter.state().await, LifecycleState::Stopped);
    }

    /// A failed start still leads to a real stop on shutdown
    #[tokio::test]
    async fn test_failed_start_then_shutdown_calls_stop() {
        let start_error = TransportError::connection("mem", "refused");
        let stop_error = TransportError::upload("mem", "flush failed");
        let client = InMemoryClient::new("mem")
            .fail_start(start_error.clone())
            .fail_stop(stop_error.clone());
        let handle = client.clone();
        let exporter = TraceExporter::new_unstarted(client);

        assert_eq!(
            exporter.start().await,
            Err(ExportError::Transport(start_error))
        );
        assert_eq!(exporter.state().await, LifecycleState::Started);

        assert_eq!(
            exporter.shutdown().await,
            Err(ExportError::Transport(stop_error))
        );
        assert_eq!(handle.stop_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_reach_client_once() {
        let client = InMemoryClient::new("mem").with_start_delay(Duration::from_millis(20));
        let handle = client.clone();
        let exporter = Arc::new(TraceExporter::new_unstarted(client));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let exporter = Arc::clone(&exporter);
                tokio::spawn(async move { exporter.start().await })
            })
            .collect();

        let mut succeeded = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(ExportError::AlreadyStarted) => rejected += 1,
                Err(e) => panic!("unexpected start error: {e}"),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(rejected, 15);
        assert_eq!(handle.start_count(), 1);
        assert!(handle.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_after_failed_start() {
        let start_error = TransportError::connection("mem", "refused");
        let client = InMemoryClient::new("mem")
            .fail_start(start_error.clone())
            .with_start_delay(Duration::from_millis(20));
        let handle = client.clone();
        let exporter = Arc::new(TraceExporter::new_unstarted(client));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let exporter = Arc::clone(&exporter);
                tokio::spawn(async move { exporter.start().await })
            })
            .collect();

        let mut failed = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Err(ExportError::AlreadyStarted) => rejected += 1,
                Err(e) => {
                    assert_eq!(e, ExportError::Transport(start_error.clone()));
                    failed += 1;
                }
                Ok(()) => panic!("start cannot succeed"),
            }
        }

        assert_eq!(failed, 1);
        assert_eq!(rejected, 7);
        assert_eq!(handle.start_count(), 1);
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_start_after_failed_start_is_rejected() {
        let start_error = TransportError::connection("mem", "refused");
        let client = InMemoryClient::new("mem").fail_start(start_error.clone());
        let handle = client.clone();
        let exporter = TraceExporter::new_unstarted(client);

        assert_eq!(
            exporter.start().await,
            Err(ExportError::Transport(start_error))
        );
        assert_eq!(exporter.start().await, Err(ExportError::AlreadyStarted));
        assert_eq!(exporter.start().await, Err(ExportError::AlreadyStarted));
        assert_eq!(handle.start_count(), 1);
        assert_eq!(exporter.state().await, LifecycleState::Started);
    }

    /// Poll `fut` once, report on `entered`, then run it to completion
    async fn report_first_poll<F: Future>(fut: F, entered: mpsc::UnboundedSender<()>) -> F::Output {
        let mut fut = std::pin::pin!(fut);
        let first = std::future::poll_fn(|cx| Poll::Ready(fut.as_mut().poll(cx))).await;
        let _ = entered.send(());
        match first {
            Poll::Ready(output) => output,
            Poll::Pending => fut.await,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_shutdowns_share_one_result() {
        const CALLERS: usize = 12;

        let stop_error = TransportError::connection("mem", "reset by peer");
        let release = Arc::new(Notify::new());
        let client = InMemoryClient::new("mem")
            .fail_stop(stop_error.clone())
            .hold_stop(Arc::clone(&release));
        let handle = client.clone();
        let exporter = Arc::new(
            MetricExporter::new(client, MetricExporterOptions::new())
                .await
                .unwrap(),
        );

        let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
        let tasks: Vec<_> = (0..CALLERS)
            .map(|_| {
                let exporter = Arc::clone(&exporter);
                let entered = entered_tx.clone();
                tokio::spawn(async move { report_first_poll(exporter.shutdown(), entered).await })
            })
            .collect();

        // Stop is held, so every caller is parked inside shutdown before it ends
        for _ in 0..CALLERS {
            entered_rx.recv().await.unwrap();
        }
        assert_eq!(handle.stop_count(), 1);
        assert_eq!(exporter.state().await, LifecycleState::Started);
        release.notify_one();

        for task in tasks {
            assert_eq!(
                task.await.unwrap(),
                Err(ExportError::Transport(stop_error.clone()))
            );
        }
        assert_eq!(handle.stop_count(), 1);
        assert!(!handle.is_connected());
        assert_eq!(exporter.state().await, LifecycleState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_shutdowns_after_failed_start() {
        let client =
            InMemoryClient::new("mem").fail_start(TransportError::connection("mem", "refused"));
        let handle = client.clone();
        let exporter = Arc::new(TraceExporter::new_unstarted(client));
        assert!(exporter.start().await.is_err());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let exporter = Arc::clone(&exporter);
                tokio::spawn(async move { exporter.shutdown().await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(()));
        }
        assert_eq!(handle.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_never_started_is_noop() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let exporter = TraceExporter::new_unstarted(client);

        assert_eq!(exporter.shutdown().await, Ok(()));
        assert_eq!(exporter.shutdown().await, Ok(()));
        assert_eq!(handle.start_count(), 0);
        assert_eq!(handle.stop_count(), 0);
        assert_eq!(exporter.state().await, LifecycleState::Fresh);
    }

    #[tokio::test]
    async fn test_shutdown_after_stopped_returns_ok() {
        let client = InMemoryClient::new("mem").fail_stop(TransportError::upload("mem", "x"));
        let handle = client.clone();
        let exporter = TraceExporter::new(client).await.unwrap();

        assert!(exporter.shutdown().await.is_err());
        assert_eq!(exporter.shutdown().await, Ok(()));
        assert_eq!(handle.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_start_after_shutdown_is_rejected() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let exporter = TraceExporter::new(client).await.unwrap();
        exporter.shutdown().await.unwrap();

        assert_eq!(exporter.start().await, Err(ExportError::AlreadyStarted));
        assert_eq!(handle.start_count(), 1);
        assert_eq!(exporter.state().await, LifecycleState::Stopped);
    }
}

#[cfg(test)]
mod export_tests {
    use contracts::{ExportError, TransportError};
    use exporter::{InMemoryClient, MetricExporterOptions, TraceExporter};
    use exporter::{new_metric_pipeline, ControllerOptions};

    use super::span;

    #[tokio::test]
    async fn test_empty_batch_skips_client() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let exporter = TraceExporter::new_unstarted(client);

        // Not started: the empty batch must still succeed
        assert_eq!(exporter.export_spans(&[]).await, Ok(()));
        assert_eq!(handle.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_export_before_start_surfaces_client_error() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let exporter = TraceExporter::new_unstarted(client);

        assert_eq!(
            exporter.export_spans(&[span("charge")]).await,
            Err(ExportError::Transport(TransportError::not_connected("mem")))
        );
        assert_eq!(handle.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_error_propagates_verbatim() {
        let error = TransportError::upload("mem", "503 from collector");
        let client = InMemoryClient::new("mem").fail_upload(error.clone());
        let exporter = TraceExporter::new(client).await.unwrap();

        assert_eq!(
            exporter.export_spans(&[span("charge")]).await,
            Err(ExportError::Transport(error))
        );
    }

    #[tokio::test]
    async fn test_empty_checkpoint_skips_client() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let (_, controller) =
            new_metric_pipeline(client, MetricExporterOptions::new(), ControllerOptions::default())
                .await
                .unwrap();

        controller.collect_and_export().await.unwrap();
        assert_eq!(handle.upload_count(), 0);
        assert_eq!(handle.start_count(), 1);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BatchConfig, MetricData, NumberValue};
    use exporter::{
        new_metric_pipeline, new_trace_pipeline, AnyClient, ControllerOptions, InMemoryClient,
        MetricExporterOptions, TracePipelineOptions,
    };

    fn file_config(dir: &std::path::Path) -> String {
        format!(
            r#"
[service]
name = "checkout"

[transport]
name = "disk"
kind = "file"

[transport.params]
dir = '{}'

[traces.batch]
max_queue_size = 64
max_export_batch_size = 16
scheduled_delay_ms = 50
"#,
            dir.display()
        )
    }

    /// MemoryTransport config -> pipelines -> InMemoryClient
    #[tokio::test]
    async fn test_config_to_delta_metric_pipeline() {
        let config = ConfigLoader::load_from_str(
            r#"
[service]
name = "checkout"

[transport]
kind = "memory"

[metrics]
export_kind = "delta"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let client = InMemoryClient::new(config.transport.name.clone());
        let handle = client.clone();
        let options =
            MetricExporterOptions::new().with_export_kind_selector(config.metrics.export_kind.selector());
        let controller_options =
            ControllerOptions::from_config(&config.metrics, config.service.resource());
        let (_, controller) = new_metric_pipeline(client, options, controller_options)
            .await
            .unwrap();

        let counter = controller.meter("orders").counter("orders.placed");
        counter.add(2.0, &[]);
        controller.collect_and_export().await.unwrap();
        counter.add(3.0, &[]);
        controller.collect_and_export().await.unwrap();

        let values: Vec<NumberValue> = handle
            .metrics()
            .into_iter()
            .filter(|m| m.name == "orders.placed")
            .flat_map(|m| match m.data {
                MetricData::Sum { data_points, .. } => data_points,
                other => panic!("expected a sum, got {other:?}"),
            })
            .map(|p| p.value)
            .collect();
        assert_eq!(
            values,
            vec![NumberValue::AsDouble(2.0), NumberValue::AsDouble(3.0)]
        );
    }

    #[tokio::test]
    async fn test_file_transport_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            ConfigLoader::load_from_str(&file_config(dir.path()), ConfigFormat::Toml).unwrap();
        let resource = config.service.resource();

        let trace_client = AnyClient::from_config(&config.transport).unwrap();
        let (_, provider) = new_trace_pipeline(
            trace_client,
            TracePipelineOptions {
                resource: resource.clone(),
                batch: config.traces.batch.clone(),
            },
        )
        .await
        .unwrap();

        let tracer = provider.tracer("checkout");
        tracer.start("charge").end();
        tracer.start("refund").end();
        provider.shutdown().await.unwrap();

        let metric_client = AnyClient::from_config(&config.transport).unwrap();
        let (exporter, controller) = new_metric_pipeline(
            metric_client,
            MetricExporterOptions::new(),
            ControllerOptions::from_config(&config.metrics, resource),
        )
        .await
        .unwrap();
        controller
            .meter("checkout")
            .counter("checkout.requests")
            .add(1.0, &[]);
        controller.collect_and_export().await.unwrap();
        exporter.shutdown().await.unwrap();

        let traces = std::fs::read_to_string(dir.path().join("traces.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = traces
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert!(!lines.is_empty());
        assert!(traces.contains("\"charge\""));
        assert!(traces.contains("\"refund\""));
        assert!(traces.contains("checkout"));

        let metrics = std::fs::read_to_string(dir.path().join("metrics.jsonl")).unwrap();
        assert!(metrics.contains("checkout.requests"));
    }

    #[tokio::test]
    async fn test_batch_processor_flushes_on_schedule() {
        let client = InMemoryClient::new("mem");
        let handle = client.clone();
        let (_, provider) = new_trace_pipeline(
            client,
            TracePipelineOptions {
                batch: BatchConfig {
                    max_queue_size: 64,
                    max_export_batch_size: 16,
                    scheduled_delay_ms: 20,
                    export_timeout_ms: 1000,
                },
                ..TracePipelineOptions::default()
            },
        )
        .await
        .unwrap();

        provider.tracer("t").start("tick").end();

        let mut exported = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !handle.trace_uploads().is_empty() {
                exported = true;
                break;
            }
        }
        assert!(exported, "span was not exported on the scheduled delay");
        assert_eq!(handle.stop_count(), 0);

        provider.shutdown().await.unwrap();
        assert_eq!(handle.stop_count(), 1);
    }
}
