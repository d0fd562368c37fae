//! Interactive menu route.

use crate::routes::{error_response, join_error};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;
use tradelog_core::PromptOutcome;
use tracing::info;

/// Show the presenter and apply whatever the user picks.
///
/// Blocks until the menu closes.
pub async fn open(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PromptOutcome>, (StatusCode, String)> {
    let actioner = Arc::clone(&state.actioner);
    let presenter = Arc::clone(&state.presenter);

    let outcome = tokio::task::spawn_blocking(move || actioner.prompt(presenter.as_ref()))
        .await
        .map_err(join_error)?
        .map_err(error_response)?;

    if let PromptOutcome::Applied(report) = &outcome {
        info!(
            target: "tradelog::api",
            "Menu applied {} to {} trades",
            report.action,
            report.affected.len()
        );
    }
    Ok(Json(outcome))
}
