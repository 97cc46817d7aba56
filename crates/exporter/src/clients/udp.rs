//! UdpClient - one datagram per resource record

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

use contracts::{
    ContractError, MetricClient, ResourceMetrics, ResourceSpans, TraceClient, Transport,
    TransportError,
};

/// Serialization format for datagrams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for UdpClient
#[derive(Debug, Clone)]
pub struct UdpClientConfig {
    /// Collector address
    pub addr: SocketAddr,
    pub format: WireFormat,
    /// Largest datagram sent; bigger records fail the upload
    pub max_packet_size: usize,
}

impl UdpClientConfig {
    /// Create config from params map
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, ContractError> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| ContractError::config_validation("transport.params.addr", "missing"))?;

        let addr: SocketAddr = addr_str.parse().map_err(|e| {
            ContractError::config_validation(
                "transport.params.addr",
                format!("invalid address '{}': {}", addr_str, e),
            )
        })?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => WireFormat::Bincode,
            Some("json") | None => WireFormat::Json,
            Some(other) => {
                return Err(ContractError::config_validation(
                    "transport.params.format",
                    format!("unknown format '{}'", other),
                ))
            }
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s.parse().map_err(|_| {
                ContractError::config_validation(
                    "transport.params.max_packet_size",
                    format!("not a size: '{}'", s),
                )
            })?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Client that sends records over UDP, fire-and-forget
pub struct UdpClient {
    name: String,
    config: UdpClientConfig,
    socket: RwLock<Option<Arc<UdpSocket>>>,
}

impl UdpClient {
    pub fn new(name: impl Into<String>, config: UdpClientConfig) -> Self {
        Self {
            name: name.into(),
            config,
            socket: RwLock::new(None),
        }
    }

    /// Create from params (for config-driven construction)
    pub fn from_params(
        name: impl Into<String>,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, ContractError> {
        Ok(Self::new(name, UdpClientConfig::from_params(params)?))
    }

    fn socket(&self) -> Result<Arc<UdpSocket>, TransportError> {
        self.socket
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| TransportError::not_connected(&self.name))
    }

    fn encode<T: Serialize>(&self, record: &T) -> Result<Bytes, TransportError> {
        let data = match self.config.format {
            WireFormat::Json => serde_json::to_vec(record).map_err(|e| e.to_string()),
            WireFormat::Bincode => bincode::serialize(record).map_err(|e| e.to_string()),
        }
        .map_err(|e| TransportError::encode(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                client = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Record too large for one datagram"
            );
            return Err(TransportError::encode(
                &self.name,
                format!(
                    "record of {} bytes exceeds max packet size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(Bytes::from(data))
    }

    async fn send_all<T: Serialize>(&self, records: &[T]) -> Result<(), TransportError> {
        let socket = self.socket()?;
        let payloads = records
            .iter()
            .map(|r| self.encode(r))
            .collect::<Result<Vec<_>, _>>()?;

        for payload in payloads {
            let sent = socket
                .send(&payload)
                .await
                .map_err(|e| TransportError::upload(&self.name, e.to_string()))?;
            debug!(client = %self.name, bytes = sent, "Sent");
        }
        Ok(())
    }
}

impl Transport for UdpClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "udp_client_start", skip(self), fields(client = %self.name))]
    async fn start(&self) -> Result<(), TransportError> {
        let bind_addr = if self.config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| TransportError::connection(&self.name, e.to_string()))?;
        socket
            .connect(self.config.addr)
            .await
            .map_err(|e| TransportError::connection(&self.name, e.to_string()))?;

        debug!(client = %self.name, target = %self.config.addr, "UdpClient connected");
        *self.socket.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(socket));
        Ok(())
    }

    #[instrument(name = "udp_client_stop", skip(self), fields(client = %self.name))]
    async fn stop(&self) -> Result<(), TransportError> {
        self.socket
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!(client = %self.name, "UdpClient closed");
        Ok(())
    }
}

impl TraceClient for UdpClient {
    async fn upload_traces(&self, records: Vec<ResourceSpans>) -> Result<(), TransportError> {
        self.send_all(&records).await
    }
}

impl MetricClient for UdpClient {
    async fn upload_metrics(&self, records: Vec<ResourceMetrics>) -> Result<(), TransportError> {
        self.send_all(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{KeyValue, Resource};

    fn record() -> ResourceSpans {
        ResourceSpans {
            resource: Resource::new([KeyValue::new("service.name", "udp-test")]),
            scope_spans: Vec::new(),
        }
    }

    #[test]
    fn test_udp_config_parsing() {
        let params = BTreeMap::from([
            ("addr".to_string(), "127.0.0.1:9999".to_string()),
            ("format".to_string(), "bincode".to_string()),
        ]);
        let config = UdpClientConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, WireFormat::Bincode);
        assert_eq!(config.max_packet_size, 65000);

        let bad = BTreeMap::from([("addr".to_string(), "nowhere".to_string())]);
        assert!(UdpClientConfig::from_params(&bad).is_err());

        let bad_format = BTreeMap::from([
            ("addr".to_string(), "127.0.0.1:9999".to_string()),
            ("format".to_string(), "xml".to_string()),
        ]);
        assert!(UdpClientConfig::from_params(&bad_format).is_err());
    }

    #[tokio::test]
    async fn test_udp_client_delivers_json() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = UdpClientConfig {
            addr: receiver.local_addr().unwrap(),
            format: WireFormat::Json,
            max_packet_size: 65000,
        };
        let client = UdpClient::new("test_udp", config);

        assert_eq!(
            client.upload_traces(vec![record()]).await,
            Err(TransportError::not_connected("test_udp"))
        );

        client.start().await.unwrap();
        client.upload_traces(vec![record()]).await.unwrap();

        let mut buf = vec![0u8; 65536];
        let n = receiver.recv(&mut buf).await.unwrap();
        let parsed: ResourceSpans = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(parsed, record());

        client.stop().await.unwrap();
        assert!(client.upload_traces(vec![record()]).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_record_is_rejected() {
        let config = UdpClientConfig {
            addr: "127.0.0.1:19997".parse().unwrap(),
            format: WireFormat::Json,
            max_packet_size: 8,
        };
        let client = UdpClient::new("test_udp", config);
        client.start().await.unwrap();

        let err = client.upload_traces(vec![record()]).await.unwrap_err();
        assert!(matches!(err, TransportError::Encode { .. }));
    }
}
