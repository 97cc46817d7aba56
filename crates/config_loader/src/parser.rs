//! Config text decoding
//!
//! TOML is the format operators write; JSON is accepted for generated
//! configs. Either way the result still goes through the validator.

use std::fmt;
use std::path::Path;

use contracts::{ContractError, TelemetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Case-insensitive match on a file extension without the dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str().and_then(Self::from_extension)
    }

    /// Decode `content` into a config. Syntax errors, unknown enum values and
    /// missing required sections all surface as [`ContractError::ConfigParse`].
    pub fn parse(self, content: &str) -> Result<TelemetryConfig, ContractError> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| parse_error(self, e)),
            Self::Json => serde_json::from_str(content).map_err(|e| parse_error(self, e)),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml => f.write_str("TOML"),
            Self::Json => f.write_str("JSON"),
        }
    }
}

fn parse_error<E>(format: ConfigFormat, error: E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ContractError::ConfigParse {
        message: format!("{format} parse error: {error}"),
        source: Some(Box::new(error)),
    }
}
