//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stderr)
//!     → metrics.rs (counters and the connection gauge)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → /metrics on the auxiliary endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
