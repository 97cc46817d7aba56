//! Semantic checks on a parsed config
//!
//! - field ranges from the `validator` derives (non-empty service name,
//!   sizes and periods above zero)
//! - max_export_batch_size <= max_queue_size
//! - histogram_boundaries finite and strictly increasing
//! - required transport params present (file: dir, udp: addr)

use std::net::SocketAddr;

use contracts::{ContractError, TelemetryConfig, TransportKind};
use validator::Validate;

/// Run every rule, stopping at the first failure
pub fn validate(config: &TelemetryConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_batch(config)?;
    validate_histogram_boundaries(config)?;
    validate_transport(config)?;
    Ok(())
}

fn validate_fields(config: &TelemetryConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::config_validation("config", e.to_string()))
}

fn validate_batch(config: &TelemetryConfig) -> Result<(), ContractError> {
    let batch = &config.traces.batch;
    if batch.max_export_batch_size > batch.max_queue_size {
        return Err(ContractError::config_validation(
            "traces.batch.max_export_batch_size",
            format!(
                "max_export_batch_size ({}) must be <= max_queue_size ({})",
                batch.max_export_batch_size, batch.max_queue_size
            ),
        ));
    }
    Ok(())
}

fn validate_histogram_boundaries(config: &TelemetryConfig) -> Result<(), ContractError> {
    let Some(boundaries) = &config.metrics.histogram_boundaries else {
        return Ok(());
    };

    if boundaries.is_empty() {
        return Err(ContractError::config_validation(
            "metrics.histogram_boundaries",
            "boundaries cannot be empty",
        ));
    }
    if let Some(b) = boundaries.iter().find(|b| !b.is_finite()) {
        return Err(ContractError::config_validation(
            "metrics.histogram_boundaries",
            format!("boundary {b} is not finite"),
        ));
    }
    if let Some(pair) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
        return Err(ContractError::config_validation(
            "metrics.histogram_boundaries",
            format!(
                "boundaries must be strictly increasing, got {} then {}",
                pair[0], pair[1]
            ),
        ));
    }
    Ok(())
}

fn validate_transport(config: &TelemetryConfig) -> Result<(), ContractError> {
    let transport = &config.transport;
    if transport.name.is_empty() {
        return Err(ContractError::config_validation(
            "transport.name",
            "transport name cannot be empty",
        ));
    }

    match transport.kind {
        TransportKind::File => {
            if transport.params.get("dir").is_none_or(|d| d.is_empty()) {
                return Err(ContractError::config_validation(
                    "transport.params.dir",
                    "file transport requires 'dir'",
                ));
            }
        }
        TransportKind::Udp => {
            let addr = transport.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    "transport.params.addr",
                    "udp transport requires 'addr'",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    "transport.params.addr",
                    format!("invalid address '{addr}': {e}"),
                )
            })?;
        }
        TransportKind::Log | TransportKind::Memory => {}
    }
    Ok(())
}
