//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, timeouts > 0, addresses parse)
//! - Check that timeouts nest (probe ≤ allocation ≤ request)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AllocatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AllocatorConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },

    #[error("timeouts.probe_secs ({probe}) exceeds timeouts.allocation_secs ({allocation})")]
    ProbeExceedsAllocation { probe: u64, allocation: u64 },

    #[error("timeouts.request_secs ({request}) is shorter than timeouts.allocation_secs ({allocation})")]
    RequestShorterThanAllocation { request: u64, allocation: u64 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AllocatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.pool.servers_file.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "pool.servers_file" });
    }

    if config.allocation.max_users == 0 {
        errors.push(ValidationError::NotPositive { field: "allocation.max_users" });
    }
    if config.allocation.traffic_limit_gb == 0 {
        errors.push(ValidationError::NotPositive { field: "allocation.traffic_limit_gb" });
    }
    if config.allocation.invite_prefix.is_empty() {
        errors.push(ValidationError::Empty { field: "allocation.invite_prefix" });
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.probe_secs", timeouts.probe_secs),
        ("timeouts.allocation_secs", timeouts.allocation_secs),
        ("timeouts.request_secs", timeouts.request_secs),
        ("backend.connect_timeout_secs", config.backend.connect_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }
    if timeouts.probe_secs > timeouts.allocation_secs {
        errors.push(ValidationError::ProbeExceedsAllocation {
            probe: timeouts.probe_secs,
            allocation: timeouts.allocation_secs,
        });
    }
    // A request cut off by the HTTP timeout mid-allocation leaves an
    // unconfigured credential behind.
    if timeouts.request_secs < timeouts.allocation_secs {
        errors.push(ValidationError::RequestShorterThanAllocation {
            request: timeouts.request_secs,
            allocation: timeouts.allocation_secs,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
