use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use crate::admin::AdminState;

const HEALTHZ_OK: &str = "ok\n";

/// `GET /healthz`: up as long as the endpoint itself is up.
pub async fn healthz() -> &'static str {
    HEALTHZ_OK
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics(State(state): State<AdminState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "metrics recorder not installed\n".to_string(),
        ),
    }
}
