//! Call DTOs

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use callwave::Call;

#[derive(Debug, Serialize, ToSchema)]
pub struct CallResponse {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub phone_number: String,
    pub reg_no: Option<String>,
    pub message: Option<String>,
    pub external_call_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub live_transcript: Option<String>,
    pub final_transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub error_message: Option<String>,
}

impl CallResponse {
    pub fn from_domain(call: Call) -> Self {
        Self {
            id: call.id,
            batch_id: call.batch_id,
            phone_number: call.phone_number,
            reg_no: call.reg_no,
            message: call.message,
            external_call_id: call.external_call_id,
            status: call.status.to_string(),
            created_at: call.created_at,
            started_at: call.started_at,
            completed_at: call.completed_at,
            live_transcript: call.live_transcript,
            final_transcript: call.final_transcript,
            recording_url: call.recording_url,
            duration_seconds: call.duration_seconds,
            error_message: call.error_message,
        }
    }
}

/// Result of a manual transcript fetch
#[derive(Debug, Serialize, ToSchema)]
pub struct TranscriptResponse {
    pub call_id: Uuid,
    /// `false` when the provider has nothing yet
    pub available: bool,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub status: String,
}

impl TranscriptResponse {
    pub fn new(call: Call, available: bool) -> Self {
        Self {
            call_id: call.id,
            available,
            transcript: call.transcript().map(str::to_string),
            recording_url: call.recording_url,
            duration_seconds: call.duration_seconds,
            status: call.status.to_string(),
        }
    }
}
