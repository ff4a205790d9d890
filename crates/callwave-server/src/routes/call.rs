//! Call Routes - Call Records and Transcripts

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::error_response;
use crate::application::TranscriptFetch;
use crate::models::{CallResponse, TranscriptResponse};
use crate::AppState;

/// Get a call by ID
#[utoipa::path(
    get,
    path = "/callwave/calls/{id}",
    params(
        ("id" = Uuid, Path, description = "Call ID")
    ),
    responses(
        (status = 200, description = "Call found", body = CallResponse),
        (status = 404, description = "Call not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Call"
)]
pub async fn get_call(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CallResponse>, (StatusCode, String)> {
    let call = state
        .batch_service
        .get_call(id)
        .await
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Call not found".to_string()))?;

    Ok(Json(CallResponse::from_domain(call)))
}

/// Fetch the transcript from the provider if none is stored yet
#[utoipa::path(
    post,
    path = "/callwave/calls/{id}/transcript",
    params(
        ("id" = Uuid, Path, description = "Call ID")
    ),
    responses(
        (status = 200, description = "Transcript or not-yet-available marker", body = TranscriptResponse),
        (status = 400, description = "Call was never placed"),
        (status = 404, description = "Call not found"),
        (status = 502, description = "Provider unavailable")
    ),
    tag = "Call"
)]
pub async fn fetch_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, (StatusCode, String)> {
    let fetched = state.transcripts.fetch(id).await.map_err(error_response)?;

    let response = match fetched {
        TranscriptFetch::Available(call) => TranscriptResponse::new(call, true),
        TranscriptFetch::NotYetAvailable(call) => TranscriptResponse::new(call, false),
    };

    Ok(Json(response))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/callwave/calls/:id", get(get_call))
        .route("/callwave/calls/:id/transcript", post(fetch_transcript))
}
