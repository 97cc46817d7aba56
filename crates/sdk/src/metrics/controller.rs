//! BasicController - periodic collect and export
//!
//! Owns the accumulator (meters record into it) and the temporality
//! processor. Every `collect_period` the ticker task collects, builds a
//! checkpoint and hands it to the exporter.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use contracts::{CheckpointExporter, ExportError, ExportKindSelector, InstrumentationScope, Resource};

use super::meter::{Accumulator, Meter};
use super::processor::{AggregationProcessor, ProcessorCheckpoint};
use super::selector::{AggregatorSelector, InexpensiveDistribution};
use crate::error::SdkError;

/// Default interval between collections
pub const DEFAULT_COLLECT_PERIOD: Duration = Duration::from_secs(10);
/// Default bound on one export
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(10);

struct ControllerInner<E> {
    resource: Arc<Resource>,
    accumulator: Arc<Accumulator>,
    processor: Mutex<AggregationProcessor>,
    exporter: Arc<E>,
    collect_period: Duration,
    collect_timeout: Duration,
}

struct Ticker {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Push controller for one exporter
pub struct BasicController<E> {
    inner: Arc<ControllerInner<E>>,
    ticker: AsyncMutex<Option<Ticker>>,
}

impl<E> BasicController<E>
where
    E: CheckpointExporter + Send + Sync + 'static,
{
    /// Builder; `selector` decides temporality (usually the exporter itself)
    pub fn builder(exporter: Arc<E>, selector: Arc<dyn ExportKindSelector>) -> ControllerBuilder<E> {
        ControllerBuilder {
            exporter,
            selector,
            aggregator_selector: Arc::new(InexpensiveDistribution),
            resource: Resource::empty(),
            collect_period: DEFAULT_COLLECT_PERIOD,
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
        }
    }

    /// Meter for an instrumentation library
    pub fn meter(&self, name: impl Into<String>) -> Meter {
        Meter::new(
            InstrumentationScope::new(name),
            Arc::clone(&self.inner.accumulator),
        )
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.inner.resource
    }

    pub fn exporter(&self) -> &Arc<E> {
        &self.inner.exporter
    }

    /// Collect without exporting
    pub fn collect(&self) -> ProcessorCheckpoint {
        self.inner.collect()
    }

    /// Export a checkpoint produced by [`collect`](Self::collect), bounded
    /// by `collect_timeout`
    pub async fn export(&self, checkpoint: &ProcessorCheckpoint) -> Result<(), SdkError> {
        self.inner.export(checkpoint).await
    }

    /// Collect once and export the checkpoint
    pub async fn collect_and_export(&self) -> Result<(), SdkError> {
        self.inner.collect_and_export().await
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Spawn the periodic ticker
    #[instrument(name = "controller_start", skip(self))]
    pub async fn start(&self) -> Result<(), SdkError> {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return Err(SdkError::ControllerAlreadyStarted);
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(inner.collect_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if let Err(e) = inner.collect_and_export().await {
                            error!(error = %e, "Periodic metric export failed");
                        }
                    }
                }
            }
            debug!("Controller ticker stopped");
        });

        *ticker = Some(Ticker { stop_tx, handle });
        info!(
            period_ms = self.inner.collect_period.as_millis() as u64,
            "Metric controller started"
        );
        Ok(())
    }

    /// Stop the ticker, export a final collection and shut the exporter down
    #[instrument(name = "controller_stop", skip(self))]
    pub async fn stop(&self) -> Result<(), SdkError> {
        let Some(ticker) = self.ticker.lock().await.take() else {
            return Err(SdkError::ControllerNotStarted);
        };
        let _ = ticker.stop_tx.send(());
        if let Err(e) = ticker.handle.await {
            error!(error = ?e, "Controller ticker panicked");
        }

        let exported = self.inner.collect_and_export().await;
        let closed = self
            .inner
            .exporter
            .shutdown()
            .await
            .map_err(SdkError::from);
        info!("Metric controller stopped");
        exported.and(closed)
    }
}

impl<E> ControllerInner<E>
where
    E: CheckpointExporter + Send + Sync + 'static,
{
    fn collect(&self) -> ProcessorCheckpoint {
        let accumulations = self.accumulator.collect();
        let mut processor = self.processor.lock().unwrap_or_else(PoisonError::into_inner);
        processor.checkpoint(accumulations, &self.resource, SystemTime::now())
    }

    async fn collect_and_export(&self) -> Result<(), SdkError> {
        let checkpoint = self.collect();
        observability::record_collection(checkpoint.len());
        self.export(&checkpoint).await
    }

    async fn export(&self, checkpoint: &ProcessorCheckpoint) -> Result<(), SdkError> {
        match time::timeout(self.collect_timeout, self.exporter.export(checkpoint)).await {
            Ok(result) => result.map_err(SdkError::from),
            Err(_) => Err(SdkError::Export(ExportError::Timeout {
                operation: "export_metrics",
                after_ms: self.collect_timeout.as_millis() as u64,
            })),
        }
    }
}

/// Builder for [`BasicController`]
pub struct ControllerBuilder<E> {
    exporter: Arc<E>,
    selector: Arc<dyn ExportKindSelector>,
    aggregator_selector: Arc<dyn AggregatorSelector>,
    resource: Resource,
    collect_period: Duration,
    collect_timeout: Duration,
}

impl<E> ControllerBuilder<E>
where
    E: CheckpointExporter + Send + Sync + 'static,
{
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_aggregator_selector(mut self, selector: Arc<dyn AggregatorSelector>) -> Self {
        self.aggregator_selector = selector;
        self
    }

    pub fn with_collect_period(mut self, period: Duration) -> Self {
        self.collect_period = period;
        self
    }

    pub fn with_collect_timeout(mut self, timeout: Duration) -> Self {
        self.collect_timeout = timeout;
        self
    }

    pub fn build(self) -> BasicController<E> {
        BasicController {
            inner: Arc::new(ControllerInner {
                resource: Arc::new(self.resource),
                accumulator: Arc::new(Accumulator::new(self.aggregator_selector)),
                processor: Mutex::new(AggregationProcessor::new(self.selector)),
                exporter: self.exporter,
                collect_period: self.collect_period,
                collect_timeout: self.collect_timeout,
            }),
            ticker: AsyncMutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        Aggregation, CheckpointSet, CumulativeExportKindSelector, KeyValue, Record,
        TransformError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Capture {
        exports: AtomicUsize,
        shutdowns: AtomicUsize,
        values: Mutex<Vec<f64>>,
    }

    impl CheckpointExporter for Capture {
        async fn export(&self, checkpoint: &dyn CheckpointSet) -> Result<(), ExportError> {
            self.exports.fetch_add(1, Ordering::SeqCst);
            let mut values = Vec::new();
            checkpoint.for_each(&CumulativeExportKindSelector, &mut |record: &Record| {
                if let Aggregation::Sum(v) = record.aggregation {
                    values.push(v);
                }
                Ok::<(), TransformError>(())
            })?;
            self.values.lock().unwrap().extend(values);
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ExportError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn controller(exporter: &Arc<Capture>) -> BasicController<Capture> {
        BasicController::builder(Arc::clone(exporter), Arc::new(CumulativeExportKindSelector))
            .with_resource(Resource::new([KeyValue::new("service.name", "svc")]))
            .with_collect_period(Duration::from_millis(20))
            .build()
    }

    #[tokio::test]
    async fn test_collect_and_export_cumulative() {
        let exporter = Arc::new(Capture::default());
        let controller = controller(&exporter);
        let counter = controller.meter("test").counter("hits");

        counter.add(2.0, &[]);
        controller.collect_and_export().await.unwrap();
        counter.add(3.0, &[]);
        controller.collect_and_export().await.unwrap();

        assert_eq!(*exporter.values.lock().unwrap(), vec![2.0, 5.0]);
        assert_eq!(exporter.exports.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_collect_then_export() {
        let exporter = Arc::new(Capture::default());
        let controller = controller(&exporter);
        controller.meter("test").counter("hits").add(4.0, &[]);

        let checkpoint = controller.collect();
        assert_eq!(exporter.exports.load(Ordering::SeqCst), 0);

        controller.export(&checkpoint).await.unwrap();
        assert_eq!(*exporter.values.lock().unwrap(), vec![4.0]);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let exporter = Arc::new(Capture::default());
        let controller = controller(&exporter);

        controller.start().await.unwrap();
        assert_eq!(
            controller.start().await,
            Err(SdkError::ControllerAlreadyStarted)
        );
        controller.stop().await.unwrap();
        assert_eq!(controller.stop().await, Err(SdkError::ControllerNotStarted));
        assert_eq!(exporter.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_exports_periodically() {
        let exporter = Arc::new(Capture::default());
        let controller = controller(&exporter);
        controller.meter("test").counter("hits").add(1.0, &[]);

        controller.start().await.unwrap();
        time::sleep(Duration::from_millis(65)).await;
        assert!(exporter.exports.load(Ordering::SeqCst) >= 3);

        controller.stop().await.unwrap();
        assert!(!controller.is_running().await);
    }

    #[tokio::test]
    async fn test_slow_export_times_out() {
        struct Slow;

        impl CheckpointExporter for Slow {
            async fn export(&self, _: &dyn CheckpointSet) -> Result<(), ExportError> {
                time::sleep(Duration::from_millis(500)).await;
                Ok(())
            }

            async fn shutdown(&self) -> Result<(), ExportError> {
                Ok(())
            }
        }

        let controller = BasicController::builder(Arc::new(Slow), Arc::new(CumulativeExportKindSelector))
            .with_collect_timeout(Duration::from_millis(10))
            .build();
        let err = controller.collect_and_export().await.unwrap_err();
        assert_eq!(
            err,
            SdkError::Export(ExportError::Timeout {
                operation: "export_metrics",
                after_ms: 10
            })
        );
    }
}
