//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check addresses parse before anything binds or connects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FrontendConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::FrontendConfig;
use crate::load_balancer::AddressRecord;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend.connect is required")]
    MissingConnect,

    #[error("backend.connect '{value}' is invalid: {reason}")]
    InvalidConnect { value: String, reason: String },

    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("retries.jitter_ratio must be within 0.0..=1.0")]
    JitterOutOfRange,
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &FrontendConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend.connect.trim().is_empty() {
        errors.push(ValidationError::MissingConnect);
    } else if let Err(e) = config.backend.connect.parse::<AddressRecord>() {
        errors.push(ValidationError::InvalidConnect {
            value: config.backend.connect.clone(),
            reason: e.to_string(),
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    let positive = [
        ("workers.count", config.workers.count as u64),
        ("workers.queue_depth", config.workers.queue_depth as u64),
        ("backend.refresh_interval_secs", config.backend.refresh_interval_secs),
        ("retries.max_rounds", config.retries.max_rounds as u64),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.exchange_secs", config.timeouts.exchange_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("keepalive.idle_secs", config.keepalive.idle_secs),
        ("keepalive.interval_secs", config.keepalive.interval_secs),
        ("keepalive.probes", config.keepalive.probes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if !(0.0..=1.0).contains(&config.retries.jitter_ratio) {
        errors.push(ValidationError::JitterOutOfRange);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
