//! Configuration validation.
//!
//! Serde handles syntax; this module checks the semantic rules. All
//! problems are reported at once rather than just the first.

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::net::listener::Transport;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no primary listener address: set a tcp or unix address")]
    NoPrimaryAddress,

    #[error("auxiliary endpoint address is empty")]
    EmptyAdminAddress,

    #[error("relay queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("invalid unix socket mode {0:#o}")]
    InvalidSocketMode(u32),

    #[error("unknown log format {0:?} (expected \"text\" or \"json\")")]
    UnknownLogFormat(String),
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = Transport::resolve(&config.listener) {
        errors.push(e);
    }

    if config.admin.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyAdminAddress);
    }

    if config.queue.capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }

    if config.listener.socket_mode > 0o7777 {
        errors.push(ValidationError::InvalidSocketMode(
            config.listener.socket_mode,
        ));
    }

    match config.observability.log_format.as_str() {
        "text" | "json" => {}
        other => errors.push(ValidationError::UnknownLogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
