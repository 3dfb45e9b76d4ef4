//! Fan-in relay pipeline.
//!
//! # Data Flow
//! ```text
//! Listener ──accept──▶ acceptor.rs ──spawn per connection──▶ reader.rs
//!                                                               │
//!                                                    Record (one line)
//!                                                               ▼
//!                                          bounded relay queue (capacity N)
//!                                                               │
//!                                                               ▼
//!                                                  writer.rs ──▶ stdout
//! ```
//!
//! # Design Decisions
//! - One writer, one queue: records from different connections never
//!   interleave mid-line
//! - The bounded queue is the only flow control. A slow stdout blocks
//!   readers on enqueue, which leaves bytes unread on their sockets
//! - A record is moved into the queue; readers never touch it again

pub mod acceptor;
pub mod reader;
pub mod writer;

use tokio::sync::mpsc;

pub use acceptor::Acceptor;
pub use reader::{LineReader, ReadOutcome};
pub use writer::SerializingWriter;

/// Line delimiter.
pub const DELIMITER: u8 = b'\n';

/// One delimiter-terminated line, delimiter included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record(Vec<u8>);

impl Record {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Producer side of the relay queue. Cloned into every line reader.
pub type RelaySender = mpsc::Sender<Record>;

/// Consumer side of the relay queue. Owned by the writer.
pub type RelayReceiver = mpsc::Receiver<Record>;

/// Create the relay queue.
///
/// # Panics
///
/// Panics if `capacity` is zero; configuration validation rejects that.
pub fn channel(capacity: usize) -> (RelaySender, RelayReceiver) {
    mpsc::channel(capacity)
}
