//! Relay metrics.
//!
//! Components record through a [`MetricsSink`] they are handed at
//! construction, so tests can swap in a [`RecordingSink`] or [`NoopSink`].
//!
//! # Metrics
//! - `socket2stdout_connections_current` (gauge): open connections
//! - `socket2stdout_connections_total` (counter): connections accepted
//! - `socket2stdout_lines_read` (counter): records forwarded by line readers
//! - `socket2stdout_lines_written` (counter): write attempts to stdout
//!
//! Series names are shared with socket2stdout.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const CONNECTIONS_CURRENT: &str = "socket2stdout_connections_current";
pub const CONNECTIONS_TOTAL: &str = "socket2stdout_connections_total";
pub const LINES_READ: &str = "socket2stdout_lines_read";
pub const LINES_WRITTEN: &str = "socket2stdout_lines_written";

/// Destination for the relay's counters.
pub trait MetricsSink: Send + Sync {
    /// A connection became open.
    fn connection_opened(&self);
    /// An open connection closed.
    fn connection_closed(&self);
    /// The acceptor accepted a connection.
    fn connection_accepted(&self);
    /// A line reader forwarded a record.
    fn line_read(&self);
    /// The writer attempted to write a record, whether or not it succeeded.
    fn line_written(&self);
}

/// Sink backed by the `metrics` facade, exported in Prometheus format.
#[derive(Debug, Default)]
pub struct PrometheusSink;

impl PrometheusSink {
    /// Describe the relay metrics on the current recorder and start them at zero.
    pub fn new() -> Self {
        describe_gauge!(CONNECTIONS_CURRENT, "current connections");
        describe_counter!(CONNECTIONS_TOTAL, "total connections");
        describe_counter!(LINES_READ, "total lines read");
        describe_counter!(LINES_WRITTEN, "total lines written");

        gauge!(CONNECTIONS_CURRENT).set(0.0);
        counter!(CONNECTIONS_TOTAL).absolute(0);
        counter!(LINES_READ).absolute(0);
        counter!(LINES_WRITTEN).absolute(0);

        Self
    }
}

impl MetricsSink for PrometheusSink {
    fn connection_opened(&self) {
        gauge!(CONNECTIONS_CURRENT).increment(1.0);
    }

    fn connection_closed(&self) {
        gauge!(CONNECTIONS_CURRENT).decrement(1.0);
    }

    fn connection_accepted(&self) {
        counter!(CONNECTIONS_TOTAL).increment(1);
    }

    fn line_read(&self) {
        counter!(LINES_READ).increment(1);
    }

    fn line_written(&self) {
        counter!(LINES_WRITTEN).increment(1);
    }
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::debug!("Prometheus recorder installed");
    Ok(handle)
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn connection_opened(&self) {}
    fn connection_closed(&self) {}
    fn connection_accepted(&self) {}
    fn line_read(&self) {}
    fn line_written(&self) {}
}

/// Sink that keeps plain atomic counters.
#[derive(Debug, Default)]
pub struct RecordingSink {
    connections_current: AtomicI64,
    connections_total: AtomicU64,
    lines_read: AtomicU64,
    lines_written: AtomicU64,
}

/// Point-in-time copy of a [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub connections_current: i64,
    pub connections_total: u64,
    pub lines_read: u64,
    pub lines_written: u64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_current: self.connections_current.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            lines_written: self.lines_written.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for RecordingSink {
    fn connection_opened(&self) {
        self.connections_current.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.connections_current.fetch_sub(1, Ordering::Relaxed);
    }

    fn connection_accepted(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    fn line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    fn line_written(&self) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
    }
}
