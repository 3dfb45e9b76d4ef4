//! Per-connection line reader.
//!
//! Reads until a delimiter, forwards each complete line to the relay
//! queue, and stops at end-of-stream or on the first read error. Bytes
//! after the last delimiter are dropped when the stream ends.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::net::connection::ConnectionId;
use crate::observability::metrics::MetricsSink;
use crate::relay::{Record, RelaySender, DELIMITER};

/// How a line reader finished.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Clean end-of-stream. `discarded` counts trailing bytes with no delimiter.
    Closed { lines: u64, discarded: usize },
    /// Read failed; the connection was dropped.
    Failed { lines: u64, error: io::Error },
    /// The writer is gone, nothing left to forward to.
    RelayClosed { lines: u64 },
}

impl ReadOutcome {
    /// Number of records forwarded before the reader stopped.
    pub fn lines(&self) -> u64 {
        match self {
            ReadOutcome::Closed { lines, .. }
            | ReadOutcome::Failed { lines, .. }
            | ReadOutcome::RelayClosed { lines } => *lines,
        }
    }
}

/// Line reader for one accepted connection.
pub struct LineReader<R> {
    reader: BufReader<R>,
    id: ConnectionId,
    relay: RelaySender,
    metrics: Arc<dyn MetricsSink>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(stream: R, id: ConnectionId, relay: RelaySender, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            reader: BufReader::new(stream),
            id,
            relay,
            metrics,
        }
    }

    /// Forward lines until the connection ends. The stream is dropped
    /// (closed) when this returns.
    pub async fn run(mut self) -> ReadOutcome {
        let mut lines = 0u64;
        let mut line = Vec::new();

        let outcome = loop {
            match self.reader.read_until(DELIMITER, &mut line).await {
                Ok(0) => break ReadOutcome::Closed { lines, discarded: 0 },
                Ok(_) if line.last() != Some(&DELIMITER) => {
                    // EOF in the middle of a line.
                    tracing::debug!(
                        connection_id = %self.id,
                        discarded = line.len(),
                        "Dropping partial line at end of stream"
                    );
                    break ReadOutcome::Closed {
                        lines,
                        discarded: line.len(),
                    };
                }
                Ok(_) => {
                    self.metrics.line_read();
                    let record = Record::new(std::mem::take(&mut line));
                    if self.relay.send(record).await.is_err() {
                        tracing::debug!(connection_id = %self.id, "Relay queue closed");
                        break ReadOutcome::RelayClosed { lines };
                    }
                    lines += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        connection_id = %self.id,
                        error = %error,
                        discarded = line.len(),
                        "Read failed"
                    );
                    break ReadOutcome::Failed { lines, error };
                }
            }
        };

        tracing::debug!(connection_id = %self.id, lines = outcome.lines(), "Connection closed");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::ConnectionTracker;
    use crate::observability::metrics::RecordingSink;
    use crate::relay;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn conn_id() -> ConnectionId {
        ConnectionTracker::new(Arc::new(RecordingSink::new()))
            .track()
            .id()
    }

    async fn drain(mut rx: relay::RelayReceiver) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(record) = rx.recv().await {
            out.push(record.into_bytes());
        }
        out
    }

    #[tokio::test]
    async fn forwards_each_line_with_delimiter() {
        let (tx, rx) = relay::channel(16);
        let sink = Arc::new(RecordingSink::new());
        let reader = LineReader::new(&b"one\ntwo\n\nthree\n"[..], conn_id(), tx, sink.clone());

        let outcome = reader.run().await;
        assert!(matches!(outcome, ReadOutcome::Closed { lines: 4, discarded: 0 }));
        assert_eq!(
            drain(rx).await,
            vec![b"one\n".to_vec(), b"two\n".to_vec(), b"\n".to_vec(), b"three\n".to_vec()]
        );
        assert_eq!(sink.snapshot().lines_read, 4);
    }

    #[tokio::test]
    async fn trailing_fragment_is_discarded() {
        let (tx, rx) = relay::channel(16);
        let sink = Arc::new(RecordingSink::new());
        let reader = LineReader::new(&b"kept\npartial"[..], conn_id(), tx, sink.clone());

        let outcome = reader.run().await;
        assert!(matches!(outcome, ReadOutcome::Closed { lines: 1, discarded: 7 }));
        assert_eq!(drain(rx).await, vec![b"kept\n".to_vec()]);
        assert_eq!(sink.snapshot().lines_read, 1);
    }

    #[tokio::test]
    async fn no_delimiter_forwards_nothing() {
        let (tx, rx) = relay::channel(1);
        let reader = LineReader::new(&b"partial"[..], conn_id(), tx, Arc::new(RecordingSink::new()));

        reader.run().await;
        assert!(drain(rx).await.is_empty());
    }

    /// Yields some bytes, then fails.
    struct FailingStream {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for FailingStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "reset by peer",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn read_error_stops_reader_and_drops_fragment() {
        let (tx, rx) = relay::channel(16);
        let stream = FailingStream {
            data: Some(b"whole\nhalf"),
        };
        let reader = LineReader::new(stream, conn_id(), tx, Arc::new(RecordingSink::new()));

        match reader.run().await {
            ReadOutcome::Failed { lines, error } => {
                assert_eq!(lines, 1);
                assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(drain(rx).await, vec![b"whole\n".to_vec()]);
    }

    #[tokio::test]
    async fn stops_when_writer_is_gone() {
        let (tx, rx) = relay::channel(1);
        drop(rx);
        let reader = LineReader::new(&b"a\nb\n"[..], conn_id(), tx, Arc::new(RecordingSink::new()));

        assert!(matches!(reader.run().await, ReadOutcome::RelayClosed { lines: 0 }));
    }

    #[tokio::test]
    async fn full_queue_blocks_reader_until_writer_takes_a_record() {
        let (tx, mut rx) = relay::channel(1);
        let reader = LineReader::new(&b"a\nb\n"[..], conn_id(), tx, Arc::new(RecordingSink::new()));
        let task = tokio::spawn(reader.run());

        // "a" fills the only slot, so "b" cannot be enqueued yet.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        assert_eq!(rx.recv().await.unwrap().as_bytes(), b"a\n");
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, ReadOutcome::Closed { lines: 2, discarded: 0 }));
        assert_eq!(rx.recv().await.unwrap().as_bytes(), b"b\n");
        assert!(rx.recv().await.is_none());
    }
}
