//! Watchdog Routes - Manual Sweep

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use super::error_response;
use crate::application::SweepReport;
use crate::AppState;

/// Run one stuck-call sweep across all batches now
#[utoipa::path(
    post,
    path = "/callwave/watchdog/sweep",
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport),
        (status = 500, description = "Internal server error")
    ),
    tag = "Watchdog"
)]
pub async fn sweep(
    State(state): State<AppState>,
) -> Result<Json<SweepReport>, (StatusCode, String)> {
    let report = state
        .watchdogs
        .watchdog()
        .sweep(None)
        .await
        .map_err(error_response)?;

    tracing::info!(
        "🐕 Manual sweep: {} examined, {} timed out",
        report.examined,
        report.timed_out
    );

    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/callwave/watchdog/sweep", post(sweep))
}
