//! BatchSpanProcessor - buffers ended spans and exports them in batches
//!
//! Each processor owns an isolated bounded queue and one worker task. Ended
//! spans are handed over with `try_send`, so a slow exporter never blocks the
//! instrumented code; overflow is counted and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, instrument, warn};

use contracts::{BatchConfig, ExportError, SpanData, SpanExporter};

use super::metrics::ProcessorMetrics;
use super::processor::SpanProcessor;
use crate::error::SdkError;

/// Control messages, sent on a channel separate from the span queue so a
/// full queue never delays a flush or shutdown request
enum Control {
    Flush(oneshot::Sender<Result<(), SdkError>>),
    Shutdown(oneshot::Sender<Result<(), SdkError>>),
}

/// Span processor exporting in batches from a background worker
pub struct BatchSpanProcessor {
    /// Processor name
    name: String,
    /// Ended spans, bounded by `max_queue_size`
    spans_tx: mpsc::Sender<SpanData>,
    /// Flush / shutdown requests
    control_tx: mpsc::Sender<Control>,
    /// Shared metrics
    metrics: Arc<ProcessorMetrics>,
    /// Worker task handle, taken on shutdown
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchSpanProcessor {
    /// Spawn the worker task on the current tokio runtime
    pub fn spawn<E>(name: impl Into<String>, exporter: Arc<E>, config: BatchConfig) -> Self
    where
        E: SpanExporter + Send + Sync + 'static,
    {
        let name = name.into();
        let (spans_tx, spans_rx) = mpsc::channel(config.max_queue_size.max(1));
        let (control_tx, control_rx) = mpsc::channel(8);
        let metrics = Arc::new(ProcessorMetrics::new());

        let worker = BatchWorker {
            name: name.clone(),
            exporter,
            config,
            metrics: Arc::clone(&metrics),
            batch: Vec::new(),
        };
        let worker_handle = tokio::spawn(worker.run(spans_rx, control_rx));

        Self {
            name,
            spans_tx,
            control_tx,
            metrics,
            worker_handle: Mutex::new(Some(worker_handle)),
        }
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<ProcessorMetrics> {
        &self.metrics
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), SdkError>>) -> Control,
    ) -> Result<(), SdkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SdkError::processor_shutdown(&self.name))?;
        reply_rx
            .await
            .map_err(|_| SdkError::processor_shutdown(&self.name))?
    }
}

#[async_trait]
impl SpanProcessor for BatchSpanProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_end(&self, span: SpanData) {
        if !span.span_context.sampled {
            return;
        }
        match self.spans_tx.try_send(span) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.spans_tx.max_capacity() - self.spans_tx.capacity());
            }
            Err(mpsc::error::TrySendError::Full(span)) => {
                self.metrics.inc_dropped_count();
                observability::record_spans_dropped(&self.name, 1);
                warn!(
                    processor = %self.name,
                    span = %span.name,
                    "Queue full, span dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.inc_dropped_count();
                observability::record_spans_dropped(&self.name, 1);
                debug!(processor = %self.name, "Span ended after processor shutdown");
            }
        }
    }

    #[instrument(name = "batch_processor_flush", skip(self), fields(processor = %self.name))]
    async fn force_flush(&self) -> Result<(), SdkError> {
        self.request(Control::Flush).await
    }

    #[instrument(name = "batch_processor_shutdown", skip(self), fields(processor = %self.name))]
    async fn shutdown(&self) -> Result<(), SdkError> {
        let result = self.request(Control::Shutdown).await;
        if let Some(handle) = self.worker_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!(processor = %self.name, error = ?e, "Worker task panicked");
            }
        }
        debug!(processor = %self.name, "BatchSpanProcessor shutdown complete");
        result
    }
}

/// Worker state, owned by the spawned task
struct BatchWorker<E> {
    name: String,
    exporter: Arc<E>,
    config: BatchConfig,
    metrics: Arc<ProcessorMetrics>,
    batch: Vec<SpanData>,
}

impl<E: SpanExporter + Send + Sync + 'static> BatchWorker<E> {
    async fn run(
        mut self,
        mut spans_rx: mpsc::Receiver<SpanData>,
        mut control_rx: mpsc::Receiver<Control>,
    ) {
        debug!(processor = %self.name, "Batch worker started");

        let mut ticker = time::interval(self.config.scheduled_delay());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                span = spans_rx.recv() => match span {
                    Some(span) => {
                        self.metrics.set_queue_len(spans_rx.len());
                        self.batch.push(span);
                        if self.batch.len() >= self.config.max_export_batch_size {
                            // Failures are logged inside; the worker keeps going
                            let _ = self.export_batch().await;
                            ticker.reset();
                        }
                    }
                    None => {
                        // Processor dropped without shutdown
                        let _ = self.export_batch().await;
                        break;
                    }
                },
                control = control_rx.recv() => match control {
                    Some(Control::Flush(reply)) => {
                        let result = self.drain(&mut spans_rx).await;
                        let _ = reply.send(result);
                    }
                    Some(Control::Shutdown(reply)) => {
                        spans_rx.close();
                        let drained = self.drain(&mut spans_rx).await;
                        let closed = self.exporter.shutdown().await.map_err(SdkError::from);
                        let _ = reply.send(drained.and(closed));
                        break;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    let _ = self.export_batch().await;
                }
            }
        }

        debug!(processor = %self.name, "Batch worker stopped");
    }

    /// Export everything currently queued; returns the last export error
    async fn drain(&mut self, spans_rx: &mut mpsc::Receiver<SpanData>) -> Result<(), SdkError> {
        let mut result = Ok(());
        while let Ok(span) = spans_rx.try_recv() {
            self.batch.push(span);
            if self.batch.len() >= self.config.max_export_batch_size {
                if let Err(e) = self.export_batch().await {
                    result = Err(e);
                }
            }
        }
        if let Err(e) = self.export_batch().await {
            result = Err(e);
        }
        self.metrics.set_queue_len(0);
        result
    }

    async fn export_batch(&mut self) -> Result<(), SdkError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let timeout = self.config.export_timeout();

        let result = match time::timeout(timeout, self.exporter.export_spans(&batch)).await {
            Ok(result) => result,
            Err(_) => Err(ExportError::Timeout {
                operation: "export_spans",
                after_ms: self.config.export_timeout_ms,
            }),
        };

        match result {
            Ok(()) => {
                self.metrics.add_exported(batch.len() as u64);
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                error!(
                    processor = %self.name,
                    spans = batch.len(),
                    error = %e,
                    "Span export failed"
                );
                Err(SdkError::Export(e))
            }
        }
    }
}
