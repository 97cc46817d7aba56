//! LogClient - logs record summaries via tracing

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument};

use contracts::{
    MetricClient, ResourceMetrics, ResourceSpans, TraceClient, Transport, TransportError,
};

/// Client that logs what it would send, for debugging pipelines
pub struct LogClient {
    name: String,
    connected: AtomicBool,
}

impl LogClient {
    /// Create a new LogClient with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(false),
        }
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransportError::not_connected(&self.name))
        }
    }
}

impl Transport for LogClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_client_start", skip(self), fields(client = %self.name))]
    async fn start(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::Release);
        info!(client = %self.name, "LogClient started");
        Ok(())
    }

    #[instrument(name = "log_client_stop", skip(self), fields(client = %self.name))]
    async fn stop(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::Release);
        info!(client = %self.name, "LogClient stopped");
        Ok(())
    }
}

impl TraceClient for LogClient {
    async fn upload_traces(&self, records: Vec<ResourceSpans>) -> Result<(), TransportError> {
        self.ensure_connected()?;
        for rs in &records {
            for scope in &rs.scope_spans {
                info!(
                    client = %self.name,
                    resource = %rs.resource.equivalence_key(),
                    scope = %scope.scope.name,
                    spans = scope.spans.len(),
                    first = scope.spans.first().map(|s| s.name.as_str()).unwrap_or(""),
                    "ResourceSpans received"
                );
            }
        }
        Ok(())
    }
}

impl MetricClient for LogClient {
    async fn upload_metrics(&self, records: Vec<ResourceMetrics>) -> Result<(), TransportError> {
        self.ensure_connected()?;
        for rm in &records {
            for scope in &rm.scope_metrics {
                for metric in &scope.metrics {
                    info!(
                        client = %self.name,
                        scope = %scope.scope.name,
                        metric = %metric.name,
                        unit = %metric.unit,
                        "Metric received"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Resource;

    #[tokio::test]
    async fn test_log_client_lifecycle() {
        let client = LogClient::new("test_log");
        let records = vec![ResourceMetrics {
            resource: Resource::empty(),
            scope_metrics: Vec::new(),
        }];

        assert!(client.upload_metrics(records.clone()).await.is_err());
        client.start().await.unwrap();
        assert!(client.upload_metrics(records.clone()).await.is_ok());
        client.stop().await.unwrap();
        assert_eq!(
            client.upload_metrics(records).await,
            Err(TransportError::not_connected("test_log"))
        );
    }
}
