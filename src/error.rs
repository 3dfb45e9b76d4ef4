//! Error types for the relay.
//!
//! Only startup failures surface as errors. Accept, read, and write
//! failures are logged where they happen and never leave their unit.

use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::net::listener::BindError;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Main error type for the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
