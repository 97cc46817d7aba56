//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ExportKindConfig, TelemetryConfig, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    service: String,
    transport: String,
    traces_enabled: bool,
    metrics_enabled: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    service: config.service.name.clone(),
                    transport: format!("{} ({:?})", config.transport.name, config.transport.kind),
                    traces_enabled: config.traces.enabled,
                    metrics_enabled: config.metrics.enabled,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &TelemetryConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.traces.enabled && !config.metrics.enabled {
        warnings.push("Both pipelines are disabled - nothing will be exported".to_string());
    }

    if config.transport.kind == TransportKind::Memory {
        warnings.push("Memory transport keeps records in process only".to_string());
    }

    let batch = &config.traces.batch;
    if config.traces.enabled && batch.export_timeout_ms < batch.scheduled_delay_ms {
        warnings.push(format!(
            "traces.batch.export_timeout_ms ({}) is shorter than scheduled_delay_ms ({})",
            batch.export_timeout_ms, batch.scheduled_delay_ms
        ));
    }

    let metrics = &config.metrics;
    if metrics.enabled && metrics.collect_timeout_ms > metrics.collect_period_ms {
        warnings.push(format!(
            "metrics.collect_timeout_ms ({}) exceeds collect_period_ms ({}) - collections may overlap",
            metrics.collect_timeout_ms, metrics.collect_period_ms
        ));
    }

    if metrics.enabled && metrics.export_kind == ExportKindConfig::Stateless {
        warnings.push(
            "Stateless export kind reports delta values for synchronous instruments".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Service: {}", summary.service);
            println!("  Transport: {}", summary.transport);
            println!("  Traces: {}", enabled(summary.traces_enabled));
            println!("  Metrics: {}", enabled(summary.metrics_enabled));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
