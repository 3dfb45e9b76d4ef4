//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use line_relay::net::listener::ListenAddr;
use line_relay::observability::metrics::RecordingSink;
use line_relay::{RelayConfig, Server};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Output sink that keeps everything written to it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.contents())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Wait until at least `count` complete lines have been written.
    pub async fn wait_for_lines(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let written = self.contents().iter().filter(|b| **b == b'\n').count();
                if written >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for output lines");
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Config with ephemeral TCP ports for both listeners.
pub fn tcp_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.tcp_address = "127.0.0.1:0".into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config.shutdown.drain_timeout_secs = 5;
    config
}

/// Config for a Unix socket at `path`.
pub fn unix_config(path: &std::path::Path) -> RelayConfig {
    let mut config = tcp_config();
    config.listener.unix_address = path.display().to_string();
    config
}

/// A relay running in the background with a captured output.
pub struct RunningRelay {
    pub addr: ListenAddr,
    pub admin: SocketAddr,
    pub output: SharedBuffer,
    pub metrics: Arc<RecordingSink>,
    stop: Option<oneshot::Sender<()>>,
    force: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RunningRelay {
    pub async fn start(config: RelayConfig) -> Self {
        let metrics = Arc::new(RecordingSink::new());
        let bound = Server::new(config, metrics.clone())
            .unwrap()
            .bind()
            .await
            .unwrap();

        let addr = bound.local_addr();
        let admin = bound.admin_addr().unwrap();
        let output = SharedBuffer::default();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (force_tx, force_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(bound.serve(
            output.clone(),
            async move {
                let _ = stop_rx.await;
            },
            async move {
                // Dropping the sender must not count as a forced stop.
                if force_rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            },
        ));

        Self {
            addr,
            admin,
            output,
            metrics,
            stop: Some(stop_tx),
            force: Some(force_tx),
            task,
        }
    }

    /// Deliver the stop trigger (what SIGTERM does in the binary).
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }

    /// Deliver the force trigger (what a second SIGTERM does in the binary).
    pub fn force_stop(&mut self) {
        if let Some(tx) = self.force.take() {
            let _ = tx.send(());
        }
    }

    /// Stop and wait for the relay to finish.
    pub async fn finish(mut self) -> SharedBuffer {
        self.stop();
        self.wait().await
    }

    /// Wait for the relay to finish without triggering the stop.
    pub async fn wait(self) -> SharedBuffer {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("relay did not finish")
            .unwrap();
        self.output
    }

    /// Try to connect to the primary listener.
    pub async fn connect(&self) -> io::Result<Client> {
        match &self.addr {
            ListenAddr::Tcp(addr) => Ok(Client::Tcp(TcpStream::connect(addr).await?)),
            ListenAddr::Unix(path) => Ok(Client::Unix(UnixStream::connect(path).await?)),
        }
    }

    /// Poll until new connections are refused.
    pub async fn wait_until_refusing(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.connect().await.is_ok() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("listener still accepting");
    }
}

/// A connected client of either transport.
pub enum Client {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Client {
    pub async fn send(&mut self, data: &[u8]) {
        match self {
            Client::Tcp(s) => s.write_all(data).await.unwrap(),
            Client::Unix(s) => s.write_all(data).await.unwrap(),
        }
    }

    /// Half-close the write side so the relay sees end-of-stream.
    pub async fn close(mut self) {
        match &mut self {
            Client::Tcp(s) => s.shutdown().await.unwrap(),
            Client::Unix(s) => s.shutdown().await.unwrap(),
        }
    }
}
