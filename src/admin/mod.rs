//! Auxiliary HTTP endpoint: health checks and metrics.
//!
//! # Routes
//! - `GET /healthz`: fixed `ok` body
//! - `GET /metrics`: Prometheus metrics

pub mod handlers;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::net::listener::{normalize_tcp_address, BindError};

/// Shared state for the auxiliary handlers.
#[derive(Clone, Default)]
pub struct AdminState {
    pub prometheus: Option<PrometheusHandle>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The endpoint did not finish its graceful shutdown in time.
#[derive(Debug, Error)]
#[error("auxiliary endpoint shutdown timed out after {0:?}")]
pub struct ShutdownTimeout(pub Duration);

/// Auxiliary endpoint that has been bound but not started.
pub struct AdminServer {
    listener: TcpListener,
    router: Router,
}

impl AdminServer {
    /// Bind the endpoint. Failure here is fatal at startup.
    pub async fn bind(address: &str, state: AdminState) -> Result<Self, BindError> {
        let address = normalize_tcp_address(address);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| BindError::Listen {
                transport: "http",
                address: address.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            router: setup_admin_router(state),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start serving in the background.
    pub fn spawn(self) -> AdminHandle {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let addr = self.listener.local_addr().ok();

        let task = tokio::spawn(async move {
            tracing::info!(address = ?addr, "Auxiliary endpoint listening");
            axum::serve(self.listener, self.router)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        AdminHandle { stop_tx, task }
    }
}

/// Handle to a running auxiliary endpoint.
pub struct AdminHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl AdminHandle {
    /// Stop the endpoint, waiting at most `timeout` for in-flight requests.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), ShutdownTimeout> {
        let _ = self.stop_tx.send(());

        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!("Auxiliary endpoint stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(error = %e, "Auxiliary endpoint failed");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Auxiliary endpoint task panicked");
                Ok(())
            }
            Err(_) => {
                task.abort();
                Err(ShutdownTimeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    async fn request(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (status, body) = request(setup_admin_router(AdminState::default()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok\n");
    }

    #[tokio::test]
    async fn metrics_renders_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(crate::observability::metrics::LINES_READ).increment(3);
        });

        let state = AdminState {
            prometheus: Some(handle),
        };
        let (status, body) = request(setup_admin_router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("socket2stdout_lines_read 3"));
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_unavailable() {
        let (status, _) = request(setup_admin_router(AdminState::default()), "/metrics").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _) = request(setup_admin_router(AdminState::default()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn spawned_endpoint_stops_within_timeout() {
        let server = AdminServer::bind("127.0.0.1:0", AdminState::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.spawn();

        handle.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn bind_conflict_is_bind_error() {
        let first = AdminServer::bind("127.0.0.1:0", AdminState::default())
            .await
            .unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let err = AdminServer::bind(&addr, AdminState::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BindError::Listen { transport: "http", .. }));
    }
}
