//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (limits > 0, connections > 0)
//! - Reject log filters the subscriber would refuse at startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AuthServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::AuthServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    ZeroConnections,

    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    InvalidMetricsAddress(String),

    #[error("observability.metrics_address {0} collides with listener.bind_address")]
    AddressConflict(SocketAddr),

    #[error("observability.log_level '{0}' is not a valid filter directive")]
    InvalidLogLevel(String),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &AuthServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let bind = config.listener.bind_address.parse::<SocketAddr>();
    if bind.is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    let limits = &config.limits;
    for (field, value) in [
        ("max_head_bytes", limits.max_head_bytes),
        ("max_headers", limits.max_headers),
        ("max_body_bytes", limits.max_body_bytes),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit(field));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled {
        match observability.metrics_address.parse::<SocketAddr>() {
            Ok(metrics) => {
                if bind.as_ref().is_ok_and(|bind| addresses_overlap(*bind, metrics)) {
                    errors.push(ValidationError::AddressConflict(metrics));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidMetricsAddress(
                observability.metrics_address.clone(),
            )),
        }
    }
    if EnvFilter::try_new(&observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Two listeners collide on the same port when either binds every interface.
fn addresses_overlap(a: SocketAddr, b: SocketAddr) -> bool {
    a.port() == b.port()
        && (a.ip() == b.ip() || a.ip().is_unspecified() || b.ip().is_unspecified())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&AuthServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = AuthServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.listener.max_connections = 0;
        config.limits.max_headers = 0;
        config.limits.max_body_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("not-an-address".into()),
                ValidationError::ZeroConnections,
                ValidationError::ZeroLimit("max_headers"),
                ValidationError::ZeroLimit("max_body_bytes"),
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = AuthServerConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("nowhere".into())])
        );
    }

    #[test]
    fn metrics_cannot_share_listener_address() {
        let mut config = AuthServerConfig::default();
        config.listener.bind_address = "127.0.0.1:9085".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "127.0.0.1:9085".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[..], [ValidationError::AddressConflict(_)]));
    }

    #[test]
    fn wildcard_bind_conflicts_with_any_interface_on_same_port() {
        let mut config = AuthServerConfig::default();
        config.listener.bind_address = "0.0.0.0:9085".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "127.0.0.1:9085".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[..], [ValidationError::AddressConflict(_)]));

        config.listener.bind_address = "127.0.0.1:9085".into();
        config.observability.metrics_address = "0.0.0.0:9085".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn distinct_ports_or_interfaces_do_not_conflict() {
        let mut config = AuthServerConfig::default();
        config.observability.metrics_enabled = true;
        config.listener.bind_address = "0.0.0.0:9085".into();
        config.observability.metrics_address = "0.0.0.0:9090".into();
        assert!(validate_config(&config).is_ok());

        config.listener.bind_address = "127.0.0.1:9085".into();
        config.observability.metrics_address = "127.0.0.2:9085".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_unparseable_log_filter() {
        let mut config = AuthServerConfig::default();
        config.observability.log_level = "authserver=loud".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidLogLevel("authserver=loud".into())])
        );
    }
}
