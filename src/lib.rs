//! Line relay library.
//!
//! Accepts many connections over TCP or a Unix socket and copies their
//! newline-delimited records to stdout, one whole line at a time.

pub mod admin;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod server;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use lifecycle::Shutdown;
pub use server::{BoundServer, Server};
