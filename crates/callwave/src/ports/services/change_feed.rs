//! Store Change Feed Port
//!
//! The call record store pushes a notification for every call and batch
//! row update. Consumers (client sync) subscribe and filter by batch.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{BatchStatus, CallStatus};

/// One row update in the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum StoreChange {
    Call {
        id: Uuid,
        batch_id: Uuid,
        status: CallStatus,
    },
    Batch {
        id: Uuid,
        status: BatchStatus,
        successful_calls: i32,
        failed_calls: i32,
    },
}

impl StoreChange {
    pub fn batch_id(&self) -> Uuid {
        match self {
            StoreChange::Call { batch_id, .. } => *batch_id,
            StoreChange::Batch { id, .. } => *id,
        }
    }

    /// Whether this change reports the batch reaching completion
    pub fn is_batch_completion(&self) -> bool {
        matches!(
            self,
            StoreChange::Batch {
                status: BatchStatus::Completed,
                ..
            }
        )
    }
}

/// Subscription source for store changes
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
