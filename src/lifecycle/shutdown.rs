//! Shutdown coordination for the relay.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::admin::AdminHandle;

/// Single-slot shutdown flag shared by the acceptor and the coordinator.
///
/// Triggering never blocks and may happen any number of times. Checking
/// does not consume the signal.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new shutdown signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Check if shutdown has been signaled.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        if self.is_triggered() {
            Phase::Stopping
        } else {
            Phase::Running
        }
    }

    /// Resolve once shutdown has been signaled.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle phase. `Stopping` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Stopping,
}

/// Moves the relay from `Running` to `Stopping`.
///
/// On the stop trigger it first takes the auxiliary endpoint down so
/// health checks start failing, then signals the acceptor, which closes
/// the listener. Open connections are not interrupted.
pub struct ShutdownCoordinator {
    shutdown: Shutdown,
    admin: Option<AdminHandle>,
    admin_timeout: std::time::Duration,
}

impl ShutdownCoordinator {
    pub fn new(shutdown: Shutdown, admin: Option<AdminHandle>, admin_timeout: std::time::Duration) -> Self {
        Self {
            shutdown,
            admin,
            admin_timeout,
        }
    }

    /// Wait for `stop`, then run the stop sequence.
    pub async fn run<F>(self, stop: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = stop => {}
            // Someone else already flipped the flag; still stop the endpoint.
            _ = self.shutdown.wait() => {}
        }

        tracing::info!("Shutdown requested, stopping auxiliary endpoint");

        if let Some(admin) = self.admin {
            if let Err(e) = admin.shutdown(self.admin_timeout).await {
                tracing::warn!(error = %e, "Auxiliary endpoint did not stop cleanly");
            }
        }

        self.shutdown.trigger();
        tracing::info!("Stopped accepting connections");
    }
}
