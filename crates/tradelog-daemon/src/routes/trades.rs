//! Pending trade routes.

use crate::routes::{error_response, join_error};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tradelog_core::ActionReport;
use tradelog_types::{ActionCode, TradeEvent};
use tracing::info;

#[derive(Serialize)]
pub struct TradesResponse {
    /// Menu rows, index-aligned with `trades`.
    pub items: Vec<String>,
    pub trades: Vec<TradeEvent>,
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub indices: Vec<usize>,
    pub action: ActionCode,
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<TradesResponse> {
    let trades = state.pipeline.store().snapshot();
    let items = trades.iter().map(TradeEvent::display_line).collect();
    Json(TradesResponse { items, trades })
}

pub async fn apply(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<ActionReport>, (StatusCode, String)> {
    info!(
        target: "tradelog::api",
        "Apply {} to rows {:?}",
        request.action,
        request.indices
    );

    // Game actions shell out and sleep.
    let actioner = Arc::clone(&state.actioner);
    let report = tokio::task::spawn_blocking(move || {
        actioner.act(&request.indices, request.action)
    })
    .await
    .map_err(join_error)?
    .map_err(error_response)?;

    Ok(Json(report))
}
