//! Batch Routes - Creation, Dispatch and Emergency Stop
//!
//! HTTP handlers that delegate to the application services.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use callwave::NewCall;

use super::error_response;
use crate::application::StopSummary;
use crate::models::{
    BatchDetailResponse, BatchResponse, CallResponse, ChangeResponse, ChangesQuery,
    CreateBatchRequest, DispatchAccepted,
};
use crate::AppState;

const DEFAULT_WAIT_SECS: u64 = 25;
const MAX_WAIT_SECS: u64 = 60;

/// Create a batch of queued calls
#[utoipa::path(
    post,
    path = "/callwave/batches",
    request_body = CreateBatchRequest,
    responses(
        (status = 200, description = "Batch created", body = BatchDetailResponse),
        (status = 400, description = "Invalid batch"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Batch"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<Json<BatchDetailResponse>, (StatusCode, String)> {
    let entries: Vec<NewCall> = payload.calls.into_iter().map(NewCall::from).collect();

    let (batch, calls) = state
        .batch_service
        .create(payload.name, payload.message, entries)
        .await
        .map_err(error_response)?;

    Ok(Json(BatchDetailResponse {
        batch: BatchResponse::from_domain(batch),
        calls: calls.into_iter().map(CallResponse::from_domain).collect(),
    }))
}

/// List all batches, newest first
#[utoipa::path(
    get,
    path = "/callwave/batches",
    responses(
        (status = 200, description = "List of batches", body = Vec<BatchResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "Batch"
)]
pub async fn list_batches(
    State(state): State<AppState>,
) -> Result<Json<Vec<BatchResponse>>, (StatusCode, String)> {
    let batches = state.batch_service.list().await.map_err(error_response)?;

    Ok(Json(
        batches.into_iter().map(BatchResponse::from_domain).collect(),
    ))
}

/// Get a batch with its calls
#[utoipa::path(
    get,
    path = "/callwave/batches/{id}",
    params(
        ("id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch found", body = BatchDetailResponse),
        (status = 404, description = "Batch not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Batch"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchDetailResponse>, (StatusCode, String)> {
    let (batch, calls) = state
        .batch_service
        .get(id)
        .await
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Batch not found".to_string()))?;

    Ok(Json(BatchDetailResponse {
        batch: BatchResponse::from_domain(batch),
        calls: calls.into_iter().map(CallResponse::from_domain).collect(),
    }))
}

/// Start dispatching a batch in the background
#[utoipa::path(
    post,
    path = "/callwave/batches/{id}/dispatch",
    params(
        ("id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 202, description = "Dispatch started", body = DispatchAccepted),
        (status = 404, description = "Batch not found"),
        (status = 409, description = "Batch already dispatching or completed"),
        (status = 500, description = "Provider not configured")
    ),
    tag = "Batch"
)]
pub async fn dispatch_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<DispatchAccepted>), (StatusCode, String)> {
    let batch = state
        .dispatcher
        .claim_batch(id)
        .await
        .map_err(error_response)?;

    let dispatch = state.dispatcher.spawn(batch.clone());
    state.watchdogs.start(id, dispatch).await;
    let watchdog_started = state.watchdogs.is_running(id).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchAccepted {
            batch_id: id,
            total_calls: batch.total_calls,
            watchdog_started,
        }),
    ))
}

/// Emergency stop: cancel every open call of the batch
#[utoipa::path(
    post,
    path = "/callwave/batches/{id}/stop",
    params(
        ("id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch stopped", body = StopSummary),
        (status = 404, description = "Batch not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Batch"
)]
pub async fn stop_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StopSummary>, (StatusCode, String)> {
    let summary = state.emergency_stop.stop(id).await.map_err(error_response)?;
    state.watchdogs.stop(id).await;

    Ok(Json(summary))
}

/// Wait for the next change of a batch or one of its calls
#[utoipa::path(
    get,
    path = "/callwave/batches/{id}/changes",
    params(
        ("id" = Uuid, Path, description = "Batch ID"),
        ChangesQuery
    ),
    responses(
        (status = 200, description = "Next change", body = ChangeResponse),
        (status = 204, description = "No change before the wait elapsed"),
        (status = 404, description = "Batch not found")
    ),
    tag = "Batch"
)]
pub async fn batch_changes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChangesQuery>,
) -> Result<Response, (StatusCode, String)> {
    // Subscribe first so nothing slips in between the lookup and the wait
    let mut changes = state.change_feed.subscribe();

    state
        .batch_service
        .get(id)
        .await
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Batch not found".to_string()))?;

    let wait = Duration::from_secs(query.wait_secs.unwrap_or(DEFAULT_WAIT_SECS).min(MAX_WAIT_SECS));

    let next = tokio::time::timeout(wait, async {
        loop {
            match changes.recv().await {
                Ok(change) if change.batch_id() == id => return Some(change),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .await;

    match next {
        Ok(Some(change)) => Ok(Json(ChangeResponse::from_domain(change)).into_response()),
        _ => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/callwave/batches", get(list_batches).post(create_batch))
        .route("/callwave/batches/:id", get(get_batch))
        .route("/callwave/batches/:id/dispatch", post(dispatch_batch))
        .route("/callwave/batches/:id/stop", post(stop_batch))
        .route("/callwave/batches/:id/changes", get(batch_changes))
}
