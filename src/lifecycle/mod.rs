//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     first SIGTERM/SIGINT  → stop trigger
//!     second SIGTERM/SIGINT → force trigger, drain is abandoned
//!
//! Shutdown (shutdown.rs):
//!     stop trigger → stop auxiliary endpoint (bounded)
//!                  → set shutdown flag → acceptor exits, listener closed
//!                  → open connections finish on their own
//! ```
//!
//! # Design Decisions
//! - Running → Stopping is one-way
//! - Health checks fail before the listener closes
//! - In-flight connections are never cut off by the coordinator

pub mod shutdown;
pub mod signals;

pub use shutdown::{Phase, Shutdown, ShutdownCoordinator};
pub use signals::{TerminationSignal, TerminationSignals};
