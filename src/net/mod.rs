//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP or Unix connection
//!     → listener.rs (bind, accept, socket file lifecycle)
//!     → connection.rs (ID, open-connection tracking)
//!     → Hand off to the relay's line reader
//! ```
//!
//! # Design Decisions
//! - Exactly one primary listener, chosen by precedence (Unix over TCP)
//! - No admission control: connections are accepted while running
//! - Each connection tracked so shutdown can wait for it to drain

pub mod connection;
pub mod listener;
