//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits large enough)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// The header block terminator is 4 bytes; any smaller cap rejects every request.
const MIN_HEADER_BYTES: usize = 4;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("pool.max_workers must be at least 1")]
    EmptyPool,

    #[error("limits.max_header_bytes must be at least 4, got {0}")]
    HeaderLimitTooSmall(usize),

    #[error("listener.address must not be empty")]
    EmptyListenAddress,

    #[error("listener.proxy_agent must not be empty")]
    EmptyProxyAgent,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_tunnel_secs", timeouts.connect_tunnel_secs),
        ("timeouts.http_relay_secs", timeouts.http_relay_secs),
        ("timeouts.header_read_secs", timeouts.header_read_secs),
        ("timeouts.upstream_connect_secs", timeouts.upstream_connect_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout { field });
        }
    }

    if config.pool.max_workers == Some(0) {
        errors.push(ValidationError::EmptyPool);
    }

    if config.limits.max_header_bytes < MIN_HEADER_BYTES {
        errors.push(ValidationError::HeaderLimitTooSmall(config.limits.max_header_bytes));
    }

    if config.listener.address.trim().is_empty() {
        errors.push(ValidationError::EmptyListenAddress);
    }

    if config.listener.proxy_agent.trim().is_empty() {
        errors.push(ValidationError::EmptyProxyAgent);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_violation() {
        let mut config = ProxyConfig::default();
        config.timeouts.http_relay_secs = 0;
        config.timeouts.header_read_secs = 0;
        config.pool.max_workers = Some(0);
        config.limits.max_header_bytes = 2;
        config.listener.address = "  ".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroTimeout { field: "timeouts.http_relay_secs" },
                ValidationError::ZeroTimeout { field: "timeouts.header_read_secs" },
                ValidationError::EmptyPool,
                ValidationError::HeaderLimitTooSmall(2),
                ValidationError::EmptyListenAddress,
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "not-an-address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("not-an-address".into())])
        );
    }
}
