//! SDK error types

use contracts::ExportError;
use thiserror::Error;

/// Processor and controller errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    /// Processor worker is gone (shut down or panicked)
    #[error("processor '{name}' is shut down")]
    ProcessorShutdown { name: String },

    /// `start` called on a running controller
    #[error("controller already started")]
    ControllerAlreadyStarted,

    /// `stop` called on a controller that is not running
    #[error("controller not started")]
    ControllerNotStarted,

    /// Exporter error (from contract)
    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

impl SdkError {
    /// Create a processor shutdown error
    pub fn processor_shutdown(name: impl Into<String>) -> Self {
        Self::ProcessorShutdown { name: name.into() }
    }
}
