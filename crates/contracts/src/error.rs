//! Layered error definitions
//!
//! Categorized by source: config / transport / transform / export

use thiserror::Error;

use crate::{AggregationKind, ExportKind};

/// Configuration and general errors
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Reading the config file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error produced by a transport client
///
/// `Clone` so one stop outcome can be handed to every concurrent caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not establish or close the connection
    #[error("transport '{transport}' connection error: {message}")]
    Connection { transport: String, message: String },

    /// Upload attempted while not connected
    #[error("transport '{transport}' is not connected")]
    NotConnected { transport: String },

    /// Endpoint rejected or failed to receive records
    #[error("transport '{transport}' upload error: {message}")]
    Upload { transport: String, message: String },

    /// Records could not be serialized
    #[error("transport '{transport}' encode error: {message}")]
    Encode { transport: String, message: String },

    /// IO error
    #[error("io error: {message}")]
    Io { message: String },
}

impl TransportError {
    /// Create connection error
    pub fn connection(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create not-connected error
    pub fn not_connected(transport: impl Into<String>) -> Self {
        Self::NotConnected {
            transport: transport.into(),
        }
    }

    /// Create upload error
    pub fn upload(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create encode error
    pub fn encode(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            transport: transport.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

/// Error converting in-memory telemetry to wire records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Aggregation has no wire representation
    #[error("metric '{name}': unsupported aggregation {kind}")]
    UnsupportedAggregation { name: String, kind: AggregationKind },

    /// Checkpoint was computed with a different temporality than requested
    #[error("metric '{name}': checkpoint holds {computed} values, {requested} requested")]
    IncompatibleExportKind {
        name: String,
        computed: ExportKind,
        requested: ExportKind,
    },
}

/// Error returned by exporter operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Start was already attempted on this exporter
    #[error("already started")]
    AlreadyStarted,

    /// Client error, propagated verbatim
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Transform error
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The call running a one-shot body was dropped before it finished
    #[error("{operation} interrupted before completion")]
    Interrupted { operation: &'static str },

    /// Export did not finish in time
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

impl ExportError {
    /// The underlying client error, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}
