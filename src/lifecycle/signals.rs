//! OS signal handling.
//!
//! SIGINT and SIGTERM end the relay. The first one stops accepting and
//! starts the drain, a second one cuts the drain short. No other signals
//! are handled.

use std::io;

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Which signal ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

/// SIGINT and SIGTERM handlers, registered for the life of the value.
pub struct TerminationSignals {
    sigint: Signal,
    sigterm: Signal,
}

impl TerminationSignals {
    /// Register the handlers.
    ///
    /// Registration happens eagerly so a signal that arrives before
    /// [`recv`](Self::recv) is first polled is not lost.
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next SIGINT or SIGTERM. Can be called repeatedly.
    pub async fn recv(&mut self) -> TerminationSignal {
        let received = tokio::select! {
            _ = self.sigint.recv() => TerminationSignal::Interrupt,
            _ = self.sigterm.recv() => TerminationSignal::Terminate,
        };
        tracing::info!(signal = ?received, "Received termination signal");
        received
    }
}
