//! The single serializing writer.
//!
//! Sole consumer of the relay queue. Each record is written in full and
//! flushed before the next one is taken, so lines from concurrent
//! connections never interleave. Write failures are logged and the record
//! is dropped; the writer keeps going. Every attempt counts as written.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::observability::metrics::MetricsSink;
use crate::relay::{Record, RelayReceiver};

pub struct SerializingWriter<W> {
    output: W,
    metrics: Arc<dyn MetricsSink>,
}

impl<W: AsyncWrite + Unpin> SerializingWriter<W> {
    pub fn new(output: W, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { output, metrics }
    }

    /// Write records until every producer has gone away, then hand the
    /// output back.
    pub async fn run(mut self, mut queue: RelayReceiver) -> W {
        while let Some(record) = queue.recv().await {
            if let Err(e) = self.write_record(&record).await {
                tracing::error!(
                    error = %e,
                    bytes = record.as_bytes().len(),
                    "Failed to write to output"
                );
            }
            self.metrics.line_written();
        }

        tracing::debug!("Relay queue closed, writer stopping");
        self.output
    }

    async fn write_record(&mut self, record: &Record) -> std::io::Result<()> {
        self.output.write_all(record.as_bytes()).await?;
        self.output.flush().await
    }
}
