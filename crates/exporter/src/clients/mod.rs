//! Client implementations
//!
//! Contains LogClient, FileClient, UdpClient and InMemoryClient, plus
//! [`AnyClient`] for picking one from configuration.

mod file;
mod log;
mod memory;
mod udp;

pub use self::file::{FileClient, FileClientConfig};
pub use self::log::LogClient;
pub use self::memory::InMemoryClient;
pub use self::udp::{UdpClient, UdpClientConfig, WireFormat};

use contracts::{
    ContractError, MetricClient, ResourceMetrics, ResourceSpans, TraceClient, Transport,
    TransportConfig, TransportError, TransportKind,
};

/// Any bundled client, chosen at runtime
pub enum AnyClient {
    Log(LogClient),
    File(FileClient),
    Udp(UdpClient),
    Memory(InMemoryClient),
}

impl AnyClient {
    /// Build the client described by `config`. Each call returns an
    /// independent client, so traces and metrics can each own one.
    pub fn from_config(config: &TransportConfig) -> Result<Self, ContractError> {
        let name = config.name.clone();
        Ok(match config.kind {
            TransportKind::Log => AnyClient::Log(LogClient::new(name)),
            TransportKind::File => AnyClient::File(FileClient::from_params(name, &config.params)?),
            TransportKind::Udp => AnyClient::Udp(UdpClient::from_params(name, &config.params)?),
            TransportKind::Memory => AnyClient::Memory(InMemoryClient::new(name)),
        })
    }
}

impl Transport for AnyClient {
    fn name(&self) -> &str {
        match self {
            AnyClient::Log(c) => c.name(),
            AnyClient::File(c) => c.name(),
            AnyClient::Udp(c) => c.name(),
            AnyClient::Memory(c) => c.name(),
        }
    }

    async fn start(&self) -> Result<(), TransportError> {
        match self {
            AnyClient::Log(c) => c.start().await,
            AnyClient::File(c) => c.start().await,
            AnyClient::Udp(c) => c.start().await,
            AnyClient::Memory(c) => c.start().await,
        }
    }

    async fn stop(&self) -> Result<(), TransportError> {
        match self {
            AnyClient::Log(c) => c.stop().await,
            AnyClient::File(c) => c.stop().await,
            AnyClient::Udp(c) => c.stop().await,
            AnyClient::Memory(c) => c.stop().await,
        }
    }
}

impl TraceClient for AnyClient {
    async fn upload_traces(&self, records: Vec<ResourceSpans>) -> Result<(), TransportError> {
        match self {
            AnyClient::Log(c) => c.upload_traces(records).await,
            AnyClient::File(c) => c.upload_traces(records).await,
            AnyClient::Udp(c) => c.upload_traces(records).await,
            AnyClient::Memory(c) => c.upload_traces(records).await,
        }
    }
}

impl MetricClient for AnyClient {
    async fn upload_metrics(&self, records: Vec<ResourceMetrics>) -> Result<(), TransportError> {
        match self {
            AnyClient::Log(c) => c.upload_metrics(records).await,
            AnyClient::File(c) => c.upload_metrics(records).await,
            AnyClient::Udp(c) => c.upload_metrics(records).await,
            AnyClient::Memory(c) => c.upload_metrics(records).await,
        }
    }
}
