//! Call - one outbound call attempt
//!
//! Pure domain entity without infrastructure dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::CallStatus;

/// Call - Record of one outbound call attempt within a batch
///
/// `completed_at` is set exactly when `status` is terminal, and
/// `final_transcript` is written at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub phone_number: String,
    /// Registration-number-like customer reference, used to match events
    /// that never echo back our call id
    pub reg_no: Option<String>,
    /// Per-call message override (falls back to the batch message)
    pub message: Option<String>,
    /// Identifier assigned by the provider once the call is triggered
    pub external_call_id: Option<String>,
    pub status: CallStatus,
    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub live_transcript: Option<String>,
    pub final_transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub error_message: Option<String>,
}

/// Input for creating a call inside a new batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCall {
    pub phone_number: String,
    #[serde(default)]
    pub reg_no: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Call {
    /// Create a new queued call
    pub fn new(batch_id: Uuid, new_call: NewCall) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            phone_number: new_call.phone_number,
            reg_no: new_call.reg_no,
            message: new_call.message,
            external_call_id: None,
            status: CallStatus::Queued,
            version: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            live_transcript: None,
            final_transcript: None,
            recording_url: None,
            duration_seconds: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time spent since the call left the queue (or since creation if it never did)
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.started_at.unwrap_or(self.created_at)
    }

    /// Best transcript available: final if written, otherwise the live one
    pub fn transcript(&self) -> Option<&str> {
        self.final_transcript
            .as_deref()
            .or(self.live_transcript.as_deref())
    }
}
