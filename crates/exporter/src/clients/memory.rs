//! InMemoryClient - stores uploads and counts calls (test collector)

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

use contracts::{
    MetricClient, MetricRecord, ResourceMetrics, ResourceSpans, TraceClient, Transport,
    TransportError,
};

#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    traces: Mutex<Vec<Vec<ResourceSpans>>>,
    metrics: Mutex<Vec<Vec<ResourceMetrics>>>,
}

/// Client keeping every upload in memory
///
/// Clones share storage and counters, so a test can keep a handle while the
/// exporter owns the client.
#[derive(Clone)]
pub struct InMemoryClient {
    name: String,
    shared: Arc<Shared>,
    start_error: Option<TransportError>,
    stop_error: Option<TransportError>,
    upload_error: Option<TransportError>,
    start_delay: Duration,
    stop_delay: Duration,
    stop_hold: Option<Arc<Notify>>,
}

impl InMemoryClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
            start_error: None,
            stop_error: None,
            upload_error: None,
            start_delay: Duration::ZERO,
            stop_delay: Duration::ZERO,
            stop_hold: None,
        }
    }

    /// `start` fails with `error` (the client stays disconnected)
    pub fn fail_start(mut self, error: TransportError) -> Self {
        self.start_error = Some(error);
        self
    }

    /// `stop` fails with `error` (the client still disconnects)
    pub fn fail_stop(mut self, error: TransportError) -> Self {
        self.stop_error = Some(error);
        self
    }

    /// Every upload fails with `error`
    pub fn fail_upload(mut self, error: TransportError) -> Self {
        self.upload_error = Some(error);
        self
    }

    /// Hold `start` open for `delay` before answering
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Hold `stop` open for `delay` before answering
    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    /// Hold `stop` open until `release` is notified
    pub fn hold_stop(mut self, release: Arc<Notify>) -> Self {
        self.stop_hold = Some(release);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn start_count(&self) -> usize {
        self.shared.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.shared.stop_calls.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.shared.upload_calls.load(Ordering::SeqCst)
    }

    /// Every accepted trace upload, in arrival order
    pub fn trace_uploads(&self) -> Vec<Vec<ResourceSpans>> {
        self.shared
            .traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every accepted metric upload, in arrival order
    pub fn metric_uploads(&self) -> Vec<Vec<ResourceMetrics>> {
        self.shared
            .metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All received metric streams, flattened across uploads and scopes
    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.metric_uploads()
            .into_iter()
            .flatten()
            .flat_map(|rm| rm.scope_metrics)
            .flat_map(|sm| sm.metrics)
            .collect()
    }

    fn check_upload(&self) -> Result<(), TransportError> {
        self.shared.upload_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_connected() {
            return Err(TransportError::not_connected(&self.name));
        }
        match &self.upload_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl Transport for InMemoryClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.shared.start_calls.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if let Some(e) = &self.start_error {
            return Err(e.clone());
        }
        self.shared.connected.store(true, Ordering::Release);
        debug!(client = %self.name, "InMemoryClient connected");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.shared.stop_calls.fetch_add(1, Ordering::SeqCst);
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        if let Some(release) = &self.stop_hold {
            release.notified().await;
        }
        self.shared.connected.store(false, Ordering::Release);
        debug!(client = %self.name, "InMemoryClient disconnected");
        match &self.stop_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl TraceClient for InMemoryClient {
    async fn upload_traces(&self, records: Vec<ResourceSpans>) -> Result<(), TransportError> {
        self.check_upload()?;
        self.shared
            .traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(records);
        Ok(())
    }
}

impl MetricClient for InMemoryClient {
    async fn upload_metrics(&self, records: Vec<ResourceMetrics>) -> Result<(), TransportError> {
        self.check_upload()?;
        self.shared
            .metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Resource;

    #[tokio::test]
    async fn test_rejects_upload_until_started() {
        let client = InMemoryClient::new("mem");
        let records = vec![ResourceSpans {
            resource: Resource::empty(),
            scope_spans: Vec::new(),
        }];

        assert_eq!(
            client.upload_traces(records.clone()).await,
            Err(TransportError::not_connected("mem"))
        );

        client.start().await.unwrap();
        client.upload_traces(records).await.unwrap();
        assert_eq!(client.trace_uploads().len(), 1);
        assert_eq!(client.upload_count(), 2);

        client.stop().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let client = InMemoryClient::new("mem").fail_stop(TransportError::upload("mem", "x"));
        let handle = client.clone();

        client.start().await.unwrap();
        assert!(client.stop().await.is_err());
        assert_eq!(handle.start_count(), 1);
        assert_eq!(handle.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_held_stop_waits_for_release() {
        let release = Arc::new(Notify::new());
        let client = InMemoryClient::new("mem").hold_stop(Arc::clone(&release));
        client.start().await.unwrap();

        let held = tokio::time::timeout(Duration::from_millis(20), client.stop()).await;
        assert!(held.is_err());
        assert!(client.is_connected());

        release.notify_one();
        client.stop().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.stop_count(), 2);
    }
}
