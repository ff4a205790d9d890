//! Batch - a group of calls submitted together

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::BatchStatus;

/// Batch aggregate
///
/// `successful_calls + failed_calls <= total_calls` at all times, and the
/// sum equals `total_calls` once the batch is completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: Uuid,
    pub name: String,
    /// Default message spoken on every call of the batch
    pub message: Option<String>,
    pub total_calls: i32,
    pub successful_calls: i32,
    pub failed_calls: i32,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Create a new batch record
    pub fn new(name: String, message: Option<String>, total_calls: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            message,
            total_calls,
            successful_calls: 0,
            failed_calls: 0,
            status: BatchStatus::Created,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Calls already counted as either success or failure
    pub fn resolved_calls(&self) -> i32 {
        self.successful_calls + self.failed_calls
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}
