//! Lifecycle gate introspection.

use crate::state::AppState;
use axum::{Json, extract::State};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tradelog_types::GatePhase;

#[derive(Serialize)]
pub struct GateResponse {
    pub phase: GatePhase,
    pub session_anchor: NaiveDateTime,
    pub window_active: bool,
    pub window_found_at: Option<NaiveDateTime>,
    pub last_reset_at: Option<NaiveDateTime>,
    /// Earliest line time that can currently pass.
    pub floor: NaiveDateTime,
}

pub async fn show(State(state): State<Arc<AppState>>) -> Json<GateResponse> {
    let snapshot = state.pipeline.gate().snapshot();
    Json(GateResponse {
        phase: snapshot.phase(),
        session_anchor: snapshot.session_anchor,
        window_active: snapshot.window_active,
        window_found_at: snapshot.window_found_at,
        last_reset_at: snapshot.last_reset_at,
        floor: snapshot.floor(),
    })
}
