//! # Config Loader
//!
//! Reads a `TelemetryConfig` from TOML or JSON and rejects configurations
//! the pipelines cannot run with (empty service name, batch larger than the
//! queue, missing transport params, unsorted histogram boundaries).
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("telemetry.toml")).unwrap();
//! println!("Service: {}", config.service.name);
//! ```

mod parser;
mod validator;

pub use contracts::TelemetryConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Loads, validates and serializes [`TelemetryConfig`]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a config file, picking the format from its extension
    /// (`.toml` or `.json`, case-insensitive).
    pub fn load_from_path(path: &Path) -> Result<TelemetryConfig, ContractError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            ContractError::config_parse(format!(
                "unsupported config file '{}': expected .toml or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse `content` and run every validation rule on the result
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<TelemetryConfig, ContractError> {
        let config = format.parse(content)?;
        validator::validate(&config)?;
        Ok(config)
    }

    pub fn to_toml(config: &TelemetryConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &TelemetryConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[service]
name = "checkout"
version = "1.4.2"

[service.attributes]
"host.name" = "node-7"

[transport]
name = "collector"
kind = "file"

[transport.params]
dir = "./telemetry"

[traces.batch]
max_queue_size = 256
max_export_batch_size = 64
scheduled_delay_ms = 200

[metrics]
collect_period_ms = 1000
export_kind = "cumulative"
histogram_boundaries = [1.0, 10.0, 100.0]
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.service.name, "checkout");
        assert_eq!(config.transport.name, "collector");
        assert_eq!(config.traces.batch.max_export_batch_size, 64);
        assert_eq!(
            config.metrics.histogram_boundaries,
            Some(vec![1.0, 10.0, 100.0])
        );
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.service.name, config2.service.name);
        assert_eq!(config.transport.params, config2.transport.params);
        assert_eq!(
            config.traces.batch.max_queue_size,
            config2.traces.batch.max_queue_size
        );
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.service.name, config2.service.name);
        assert_eq!(config.metrics.export_kind, config2.metrics.export_kind);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[service]
name = "checkout"

[transport]
kind = "log"

[traces.batch]
max_queue_size = 8
max_export_batch_size = 16
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_queue_size"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.service.name, "checkout");

        let unknown = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(ConfigLoader::load_from_path(unknown.path()).is_err());
    }
}
