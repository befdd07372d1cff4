//! Axum router wiring.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops, probe};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ops::index))
        .route("/probe", get(probe::handler::probe))
        .route("/metrics", get(ops::metrics))
        .route("/healthz", get(ops::healthz))
        .with_state(state)
}
