//! Server: wires listener, acceptor, writer, auxiliary endpoint and
//! shutdown together.
//!
//! # Responsibilities
//! - Validate configuration and resolve the primary transport
//! - Bind the primary listener and the auxiliary endpoint (fatal on failure)
//! - Run acceptor, writer, auxiliary endpoint and shutdown coordinator
//! - After shutdown, give open connections a bounded time to finish,
//!   unless a second stop request forces an immediate return

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;

use crate::admin::{AdminServer, AdminState};
use crate::config::{validate_config, ConfigError, RelayConfig};
use crate::error::Result;
use crate::lifecycle::{Shutdown, ShutdownCoordinator, TerminationSignals};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ListenAddr, Listener, Transport};
use crate::observability::metrics::MetricsSink;
use crate::relay::{self, Acceptor, SerializingWriter};

/// A configured, not yet bound relay.
pub struct Server {
    config: RelayConfig,
    transport: Transport,
    metrics: Arc<dyn MetricsSink>,
    prometheus: Option<PrometheusHandle>,
}

impl Server {
    /// Validate `config` and build a server that records into `metrics`.
    pub fn new(config: RelayConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let transport =
            Transport::resolve(&config.listener).map_err(|e| ConfigError::Validation(vec![e]))?;

        Ok(Self {
            config,
            transport,
            metrics,
            prometheus: None,
        })
    }

    /// Serve this handle's output on `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// The transport chosen for the primary listener.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Bind the primary listener, then the auxiliary endpoint.
    pub async fn bind(self) -> Result<BoundServer> {
        let listener = Listener::bind(&self.transport, self.config.listener.socket_mode).await?;

        let admin = AdminServer::bind(
            &self.config.admin.bind_address,
            AdminState {
                prometheus: self.prometheus,
            },
        )
        .await?;

        Ok(BoundServer {
            config: self.config,
            listener,
            admin,
            metrics: self.metrics,
        })
    }

    /// Relay to stdout until SIGINT or SIGTERM. A second signal skips
    /// the drain.
    pub async fn run(self) -> Result<()> {
        let mut signals = TerminationSignals::register()?;
        let bound = self.bind().await?;

        tracing::info!(
            address = %bound.local_addr(),
            admin_address = ?bound.admin_addr(),
            "Relay listening"
        );

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (force_tx, force_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            signals.recv().await;
            let _ = stop_tx.send(());
            signals.recv().await;
            let _ = force_tx.send(());
        });

        bound
            .serve(
                tokio::io::stdout(),
                async move {
                    let _ = stop_rx.await;
                },
                async move {
                    let _ = force_rx.await;
                },
            )
            .await;
        Ok(())
    }
}

/// A relay whose sockets are bound and ready to serve.
pub struct BoundServer {
    config: RelayConfig,
    listener: Listener,
    admin: AdminServer,
    metrics: Arc<dyn MetricsSink>,
}

impl BoundServer {
    /// Address of the primary listener.
    pub fn local_addr(&self) -> ListenAddr {
        self.listener.local_addr()
    }

    /// Address of the auxiliary endpoint.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin.local_addr().ok()
    }

    /// Relay into `output` until `stop` resolves.
    ///
    /// Returns once the acceptor and the auxiliary endpoint have stopped
    /// and open connections have drained, or the drain timeout passed.
    /// If `force` resolves during the drain, returns immediately and
    /// abandons whatever is still open.
    pub async fn serve<W, F, G>(self, output: W, stop: F, force: G)
    where
        W: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()> + Send,
        G: Future<Output = ()> + Send,
    {
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new(self.metrics.clone());
        let (relay_tx, relay_rx) = relay::channel(self.config.queue.capacity);

        let writer = tokio::spawn(SerializingWriter::new(output, self.metrics.clone()).run(relay_rx));

        let admin = self.admin.spawn();

        let acceptor = tokio::spawn(
            Acceptor::new(
                self.listener,
                shutdown.clone(),
                tracker.clone(),
                relay_tx,
                self.metrics.clone(),
            )
            .run(),
        );

        let coordinator = ShutdownCoordinator::new(
            shutdown.clone(),
            Some(admin),
            self.config.admin.shutdown_timeout(),
        );

        let ((), accepted) = tokio::join!(coordinator.run(stop), acceptor);
        if let Err(e) = accepted {
            tracing::error!(error = %e, "Accept loop task failed");
        }

        let drain_timeout = self.config.shutdown.drain_timeout();
        if drain_timeout.is_zero() {
            tracing::info!(active = tracker.active_count(), "Relay stopped");
            return;
        }

        tracing::info!(
            active = tracker.active_count(),
            timeout_secs = drain_timeout.as_secs(),
            "Waiting for connections to drain"
        );

        let deadline = tokio::time::Instant::now() + drain_timeout;
        let drain = async {
            if tokio::time::timeout_at(deadline, tracker.wait_for_drain())
                .await
                .is_err()
            {
                tracing::warn!(
                    active = tracker.active_count(),
                    "Drain timeout reached, abandoning open connections"
                );
                return;
            }

            // Every producer is gone now, so the writer ends once the queue is empty.
            match tokio::time::timeout_at(deadline, writer).await {
                Ok(Ok(_)) => tracing::info!("All connections drained"),
                Ok(Err(e)) => tracing::error!(error = %e, "Writer task failed"),
                Err(_) => tracing::warn!("Drain timeout reached before output was flushed"),
            }
        };

        tokio::select! {
            _ = drain => {}
            _ = force => {
                tracing::warn!(
                    active = tracker.active_count(),
                    "Forced stop, abandoning open connections"
                );
            }
        }
    }
}
