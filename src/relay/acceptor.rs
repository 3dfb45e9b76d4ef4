//! Accept loop for the primary listener.
//!
//! # Responsibilities
//! - Accept connections until shutdown is signaled
//! - Spawn one line reader task per connection
//! - Treat accept errors as transient, except once shutdown has begun
//! - Close the listener on the way out

use std::sync::Arc;

use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Accept, Accepted, Listener};
use crate::observability::metrics::MetricsSink;
use crate::relay::{LineReader, RelaySender};

pub struct Acceptor<L = Listener> {
    listener: L,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    relay: RelaySender,
    metrics: Arc<dyn MetricsSink>,
}

impl<L: Accept> Acceptor<L> {
    pub fn new(
        listener: L,
        shutdown: Shutdown,
        tracker: ConnectionTracker,
        relay: RelaySender,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            listener,
            shutdown,
            tracker,
            relay,
            metrics,
        }
    }

    /// Run until shutdown. Connections already handed to readers keep
    /// running after this returns.
    pub async fn run(self) {
        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            // Waiting on the shutdown signal here is what closing the
            // listener under a blocked accept amounts to.
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                result = self.listener.accept() => result,
            };

            match accepted {
                Ok(conn) => self.spawn_reader(conn),
                Err(e) => {
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    // No backoff: accept errors are retried immediately.
                    tracing::warn!(error = %e, "Accept failed");
                }
            }
        }

        tracing::info!("Accept loop stopped");
        self.listener.close();
    }

    fn spawn_reader(&self, conn: Accepted) {
        self.metrics.connection_accepted();
        let guard = self.tracker.track();

        tracing::debug!(connection_id = %guard.id(), peer = %conn.peer, "Connection accepted");

        let reader = LineReader::new(conn.stream, guard.id(), self.relay.clone(), self.metrics.clone());
        tokio::spawn(async move {
            reader.run().await;
            drop(guard);
        });
    }
}
