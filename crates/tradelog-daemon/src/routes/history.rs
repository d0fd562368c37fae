//! Trade history routes.

use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tradelog_core::HistoryRow;

const DEFAULT_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub enabled: bool,
    pub entries: Vec<HistoryRow>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let Some(history) = state.history.clone() else {
        return Ok(Json(HistoryResponse {
            enabled: false,
            entries: Vec::new(),
        }));
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let entries = tokio::task::spawn_blocking(move || history.recent(limit))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(HistoryResponse {
        enabled: true,
        entries,
    }))
}
