//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut telemetry = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref name) = args.service_name {
        info!(service = %name, "Overriding service name from CLI");
        telemetry.service.name = name.clone();
    }

    info!(
        service = %telemetry.service.name,
        transport = %telemetry.transport.name,
        kind = ?telemetry.transport.kind,
        traces = telemetry.traces.enabled,
        metrics = telemetry.metrics.enabled,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&telemetry);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        telemetry,
        duration: if args.duration == 0 {
            None
        } else {
            Some(Duration::from_secs(args.duration))
        },
        rate: args.rate,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    info!("Starting pipelines...");
    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        requests = stats.requests,
        exports = stats.exports.total_exports,
        failed = stats.exports.failed_exports,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    if !stats.shutdown_errors.is_empty() {
        anyhow::bail!(
            "Pipeline shutdown reported {} error(s)",
            stats.shutdown_errors.len()
        );
    }

    info!("OTLP Pipeline finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(telemetry: &contracts::TelemetryConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Service: {}", telemetry.service.name);
    println!(
        "Transport: {} ({:?})",
        telemetry.transport.name, telemetry.transport.kind
    );

    let traces = &telemetry.traces;
    if traces.enabled {
        println!("\nTraces:");
        println!("  Queue size: {}", traces.batch.max_queue_size);
        println!("  Batch size: {}", traces.batch.max_export_batch_size);
        println!("  Scheduled delay: {}ms", traces.batch.scheduled_delay_ms);
    } else {
        println!("\nTraces: disabled");
    }

    let metrics = &telemetry.metrics;
    if metrics.enabled {
        println!("\nMetrics:");
        println!("  Export kind: {:?}", metrics.export_kind);
        println!("  Collect period: {}ms", metrics.collect_period_ms);
        if let Some(ref boundaries) = metrics.histogram_boundaries {
            println!("  Histogram boundaries: {:?}", boundaries);
        }
    } else {
        println!("\nMetrics: disabled");
    }

    println!();
}
