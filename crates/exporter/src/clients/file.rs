//! FileClient - appends records to JSON lines files

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, error, instrument};

use contracts::{
    ContractError, MetricClient, ResourceMetrics, ResourceSpans, TraceClient, Transport,
    TransportError,
};

const TRACES_FILE: &str = "traces.jsonl";
const METRICS_FILE: &str = "metrics.jsonl";

/// Configuration for FileClient
#[derive(Debug, Clone)]
pub struct FileClientConfig {
    /// Output directory, created on start
    pub dir: PathBuf,
}

impl FileClientConfig {
    /// Create config from params map
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, ContractError> {
        let dir = params
            .get("dir")
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ContractError::config_validation("transport.params.dir", "missing"))?;
        Ok(Self {
            dir: PathBuf::from(dir),
        })
    }
}

struct Files {
    traces: BufWriter<File>,
    metrics: BufWriter<File>,
}

/// Client writing one JSON document per resource record
///
/// Traces go to `traces.jsonl` and metrics to `metrics.jsonl` under the
/// configured directory. Files are appended to, never truncated.
pub struct FileClient {
    name: String,
    config: FileClientConfig,
    files: Mutex<Option<Files>>,
}

impl FileClient {
    pub fn new(name: impl Into<String>, config: FileClientConfig) -> Self {
        Self {
            name: name.into(),
            config,
            files: Mutex::new(None),
        }
    }

    /// Create from params (for config-driven construction)
    pub fn from_params(
        name: impl Into<String>,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, ContractError> {
        Ok(Self::new(name, FileClientConfig::from_params(params)?))
    }

    pub fn traces_path(&self) -> PathBuf {
        self.config.dir.join(TRACES_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.config.dir.join(METRICS_FILE)
    }

    fn open(path: &Path) -> std::io::Result<BufWriter<File>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    fn append<T: Serialize>(
        &self,
        records: &[T],
        select: impl FnOnce(&mut Files) -> &mut BufWriter<File>,
    ) -> Result<(), TransportError> {
        let mut guard = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let files = guard
            .as_mut()
            .ok_or_else(|| TransportError::not_connected(&self.name))?;
        let writer = select(files);

        for record in records {
            serde_json::to_writer(&mut *writer, record)
                .map_err(|e| TransportError::encode(&self.name, e.to_string()))?;
            writer.write_all(b"\n")?;
        }
        writer.flush().map_err(|e| {
            error!(client = %self.name, error = %e, "Flush failed");
            TransportError::from(e)
        })
    }
}

impl Transport for FileClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_client_start", skip(self), fields(client = %self.name))]
    async fn start(&self) -> Result<(), TransportError> {
        fs::create_dir_all(&self.config.dir)
            .map_err(|e| TransportError::connection(&self.name, e.to_string()))?;
        let files = Files {
            traces: Self::open(&self.traces_path())?,
            metrics: Self::open(&self.metrics_path())?,
        };
        *self.files.lock().unwrap_or_else(PoisonError::into_inner) = Some(files);
        debug!(client = %self.name, dir = %self.config.dir.display(), "FileClient opened");
        Ok(())
    }

    #[instrument(name = "file_client_stop", skip(self), fields(client = %self.name))]
    async fn stop(&self) -> Result<(), TransportError> {
        let files = self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut files) = files {
            files.traces.flush()?;
            files.metrics.flush()?;
        }
        debug!(client = %self.name, "FileClient closed");
        Ok(())
    }
}

impl TraceClient for FileClient {
    async fn upload_traces(&self, records: Vec<ResourceSpans>) -> Result<(), TransportError> {
        self.append(&records, |files| &mut files.traces)
    }
}

impl MetricClient for FileClient {
    async fn upload_metrics(&self, records: Vec<ResourceMetrics>) -> Result<(), TransportError> {
        self.append(&records, |files| &mut files.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Resource, ScopeMetrics, InstrumentationScope};
    use tempfile::tempdir;

    fn metrics_record() -> ResourceMetrics {
        ResourceMetrics {
            resource: Resource::empty(),
            scope_metrics: vec![ScopeMetrics {
                scope: InstrumentationScope::new("test"),
                metrics: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_file_config_requires_dir() {
        assert!(FileClientConfig::from_params(&BTreeMap::new()).is_err());

        let params = BTreeMap::from([("dir".to_string(), "/tmp/otlp".to_string())]);
        let config = FileClientConfig::from_params(&params).unwrap();
        assert_eq!(config.dir, PathBuf::from("/tmp/otlp"));
    }

    #[tokio::test]
    async fn test_file_client_appends_lines() {
        let dir = tempdir().unwrap();
        let client = FileClient::new(
            "test_file",
            FileClientConfig {
                dir: dir.path().join("out"),
            },
        );

        assert_eq!(
            client.upload_metrics(vec![metrics_record()]).await,
            Err(TransportError::not_connected("test_file"))
        );

        client.start().await.unwrap();
        client
            .upload_metrics(vec![metrics_record(), metrics_record()])
            .await
            .unwrap();
        client.stop().await.unwrap();

        let content = fs::read_to_string(client.metrics_path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: ResourceMetrics = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, metrics_record());

        assert!(client.traces_path().exists());
    }
}
