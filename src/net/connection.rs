//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track the number of open connections (drives the current-connections gauge)
//! - Let shutdown wait for open connections to drain

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::observability::metrics::MetricsSink;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks open connections for metrics and graceful drain.
#[derive(Clone)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    active_count: AtomicU64,
    next_id: AtomicU64,
    drained: Notify,
    metrics: Arc<dyn MetricsSink>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                active_count: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                drained: Notify::new(),
                metrics,
            }),
        }
    }

    /// Record a new open connection. Returns a guard that closes it on drop.
    pub fn track(&self) -> ConnectionGuard {
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.active_count.fetch_add(1, Ordering::SeqCst);
        self.inner.metrics.connection_opened();

        ConnectionGuard {
            tracker: self.clone(),
            id,
        }
    }

    /// Get current open connection count.
    pub fn active_count(&self) -> u64 {
        self.inner.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_for_drain(&self) {
        loop {
            // Register interest before checking the count so a close that
            // lands in between is not missed.
            let notified = self.inner.drained.notified();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self, id: ConnectionId) {
        let prev = self.inner.active_count.fetch_sub(1, Ordering::SeqCst);
        self.inner.metrics.connection_closed();
        tracing::trace!(connection_id = %id, "Connection released");
        if prev == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the open count when dropped.
pub struct ConnectionGuard {
    tracker: ConnectionTracker,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.release(self.id);
    }
}
