//! HTTP route handlers.

pub mod gate;
pub mod history;
pub mod menu;
pub mod trades;

use crate::state::AppState;
use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tradelog_core::TradelogError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The `/api` routes, without transport layers.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/trades", get(trades::list))
        .route("/trades/apply", post(trades::apply))
        .route("/menu", post(menu::open))
        .route("/gate", get(gate::show))
        .route("/history", get(history::list));

    Router::new().nest("/api", api_routes).with_state(state)
}

/// Client mistakes are 400s, everything else is the daemon's fault.
pub(crate) fn error_response(err: TradelogError) -> (StatusCode, String) {
    let status = match &err {
        TradelogError::InvalidSelection { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub(crate) fn join_error(err: tokio::task::JoinError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
