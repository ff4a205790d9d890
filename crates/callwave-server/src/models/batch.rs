//! Batch DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use callwave::{Batch, NewCall, StoreChange};

use super::CallResponse;

/// One phone number to call
#[derive(Debug, Deserialize, ToSchema)]
pub struct CallEntryRequest {
    pub phone_number: String,
    /// Customer reference echoed by some provider events
    pub reg_no: Option<String>,
    /// Overrides the batch message for this call
    pub message: Option<String>,
}

impl From<CallEntryRequest> for NewCall {
    fn from(entry: CallEntryRequest) -> Self {
        NewCall {
            phone_number: entry.phone_number,
            reg_no: entry.reg_no,
            message: entry.message,
        }
    }
}

/// Create batch request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBatchRequest {
    pub name: String,
    pub message: Option<String>,
    pub calls: Vec<CallEntryRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    pub id: Uuid,
    pub name: String,
    pub message: Option<String>,
    pub status: String,
    pub total_calls: i32,
    pub successful_calls: i32,
    pub failed_calls: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchResponse {
    pub fn from_domain(batch: Batch) -> Self {
        Self {
            id: batch.id,
            name: batch.name,
            message: batch.message,
            status: batch.status.to_string(),
            total_calls: batch.total_calls,
            successful_calls: batch.successful_calls,
            failed_calls: batch.failed_calls,
            created_at: batch.created_at,
            completed_at: batch.completed_at,
        }
    }
}

/// Batch with all of its calls
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchDetailResponse {
    pub batch: BatchResponse,
    pub calls: Vec<CallResponse>,
}

/// Accepted dispatch
#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchAccepted {
    pub batch_id: Uuid,
    pub total_calls: i32,
    pub watchdog_started: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChangesQuery {
    /// Seconds to wait for a change (default 25, max 60)
    pub wait_secs: Option<u64>,
}

/// One store change of a batch or one of its calls
#[derive(Debug, Serialize, ToSchema)]
pub struct ChangeResponse {
    /// `call` or `batch`
    pub table: String,
    pub id: Uuid,
    pub batch_id: Uuid,
    pub status: String,
    pub successful_calls: Option<i32>,
    pub failed_calls: Option<i32>,
}

impl ChangeResponse {
    pub fn from_domain(change: StoreChange) -> Self {
        match change {
            StoreChange::Call {
                id,
                batch_id,
                status,
            } => Self {
                table: "call".to_string(),
                id,
                batch_id,
                status: status.to_string(),
                successful_calls: None,
                failed_calls: None,
            },
            StoreChange::Batch {
                id,
                status,
                successful_calls,
                failed_calls,
            } => Self {
                table: "batch".to_string(),
                id,
                batch_id: id,
                status: status.to_string(),
                successful_calls: Some(successful_calls),
                failed_calls: Some(failed_calls),
            },
        }
    }
}
