//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: SpliceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderValue;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::SpliceConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic rule, collecting all failures.
pub fn validate_config(config: &SpliceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    if !config.route.prefix.starts_with('/') {
        errors.push(ValidationError::new(
            "route.prefix",
            format!("`{}` must start with `/`", config.route.prefix),
        ));
    }
    if config.route.upgrade_token.is_empty()
        || HeaderValue::from_str(&config.route.upgrade_token).is_err()
    {
        errors.push(ValidationError::new(
            "route.upgrade_token",
            "must be a non-empty header value",
        ));
    }
    for prefix in &config.route.reserved_upgrade_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "route.reserved_upgrade_prefixes",
                format!("`{prefix}` must start with `/`"),
            ));
        }
    }

    if config.timeouts.response_secs == 0 {
        errors.push(ValidationError::new("timeouts.response_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "`{}` is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
