//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::TelemetryConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    service: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    resource: BTreeMap<String, String>,
    transport: TransportInfo,
    traces: Option<TracesInfo>,
    metrics: Option<MetricsInfo>,
}

#[derive(Serialize)]
struct TransportInfo {
    name: String,
    kind: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct TracesInfo {
    max_queue_size: usize,
    max_export_batch_size: usize,
    scheduled_delay_ms: u64,
    export_timeout_ms: u64,
}

#[derive(Serialize)]
struct MetricsInfo {
    export_kind: String,
    collect_period_ms: u64,
    collect_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    histogram_boundaries: Option<Vec<f64>>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn resource_attributes(config: &TelemetryConfig) -> BTreeMap<String, String> {
    config
        .service
        .resource()
        .attributes
        .into_iter()
        .map(|kv| (kv.key, kv.value.to_string()))
        .collect()
}

fn build_config_info(config: &TelemetryConfig, args: &InfoArgs) -> ConfigInfo {
    let resource = if args.resource {
        resource_attributes(config)
    } else {
        BTreeMap::new()
    };

    let params = if args.transport {
        config.transport.params.clone()
    } else {
        BTreeMap::new()
    };

    let traces = config.traces.enabled.then(|| TracesInfo {
        max_queue_size: config.traces.batch.max_queue_size,
        max_export_batch_size: config.traces.batch.max_export_batch_size,
        scheduled_delay_ms: config.traces.batch.scheduled_delay_ms,
        export_timeout_ms: config.traces.batch.export_timeout_ms,
    });

    let metrics = config.metrics.enabled.then(|| MetricsInfo {
        export_kind: format!("{:?}", config.metrics.export_kind),
        collect_period_ms: config.metrics.collect_period_ms,
        collect_timeout_ms: config.metrics.collect_timeout_ms,
        histogram_boundaries: config.metrics.histogram_boundaries.clone(),
    });

    ConfigInfo {
        version: format!("{:?}", config.version),
        service: config.service.name.clone(),
        resource,
        transport: TransportInfo {
            name: config.transport.name.clone(),
            kind: format!("{:?}", config.transport.kind),
            params,
        },
        traces,
        metrics,
    }
}

fn print_config_info(config: &TelemetryConfig, args: &InfoArgs) {
    println!("=== OTLP Pipeline Configuration ===\n");

    println!("Service");
    println!("   ├─ Version: {:?}", config.version);
    println!("   └─ Name: {}", config.service.name);

    if args.resource {
        let attributes = resource_attributes(config);
        println!("\nResource ({})", attributes.len());
        for (i, (key, value)) in attributes.iter().enumerate() {
            let prefix = if i == attributes.len() - 1 { "└─" } else { "├─" };
            println!("   {} {} = {}", prefix, key, value);
        }
    }

    let transport = &config.transport;
    println!("\nTransport");
    println!("   ├─ Name: {}", transport.name);
    println!("   └─ Kind: {:?}", transport.kind);
    if args.transport && !transport.params.is_empty() {
        for (i, (key, value)) in transport.params.iter().enumerate() {
            let prefix = if i == transport.params.len() - 1 { "└─" } else { "├─" };
            println!("      {} {} = {}", prefix, key, value);
        }
    }

    let traces = &config.traces;
    println!("\nTraces");
    if traces.enabled {
        println!("   ├─ Queue size: {}", traces.batch.max_queue_size);
        println!("   ├─ Batch size: {}", traces.batch.max_export_batch_size);
        println!("   ├─ Scheduled delay: {}ms", traces.batch.scheduled_delay_ms);
        println!("   └─ Export timeout: {}ms", traces.batch.export_timeout_ms);
    } else {
        println!("   └─ disabled");
    }

    let metrics = &config.metrics;
    println!("\nMetrics");
    if metrics.enabled {
        println!("   ├─ Export kind: {:?}", metrics.export_kind);
        println!("   ├─ Collect period: {}ms", metrics.collect_period_ms);
        match &metrics.histogram_boundaries {
            Some(boundaries) => {
                println!("   ├─ Collect timeout: {}ms", metrics.collect_timeout_ms);
                println!("   └─ Histogram boundaries: {:?}", boundaries);
            }
            None => println!("   └─ Collect timeout: {}ms", metrics.collect_timeout_ms),
        }
    } else {
        println!("   └─ disabled");
    }

    println!();
}
