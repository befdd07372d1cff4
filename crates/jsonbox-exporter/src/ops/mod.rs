//! Operational HTTP endpoints.
//!
//! - `/`        : landing page
//! - `/healthz` : liveness
//! - `/metrics` : exporter self-metrics (Prometheus text format)

use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}};

use crate::app_state::AppState;

pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn index() -> impl IntoResponse {
    (
        StatusCode::OK,
        "jsonbox exporter\n\n\
         /probe?module=<name>&target=<url>  probe a JSON endpoint\n\
         /metrics                           exporter metrics\n\
         /healthz                           liveness\n",
    )
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics().render();

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        body,
    )
        .into_response()
}
