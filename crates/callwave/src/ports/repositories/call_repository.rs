//! Call Repository Port
//!
//! Abstract interface for Call persistence operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{errors::DomainError, Call, CallStatus};

/// Repository interface for Call entities
///
/// Calls are created together with their batch (see `BatchRepository::create`).
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Find a call by internal ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError>;

    /// Find a call by the provider-assigned ID
    async fn find_by_external_id(&self, external_call_id: &str)
        -> Result<Option<Call>, DomainError>;

    /// Most recently created non-terminal call carrying this registration number
    async fn find_latest_open_by_reg_no(&self, reg_no: &str) -> Result<Option<Call>, DomainError>;

    /// All calls of a batch, oldest first
    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Vec<Call>, DomainError>;

    /// Calls of a batch in any of `statuses`, oldest first
    async fn find_by_batch_and_status(
        &self,
        batch_id: Uuid,
        statuses: &[CallStatus],
    ) -> Result<Vec<Call>, DomainError>;

    /// Calls in any of `statuses` whose `started_at` (or `created_at` when not
    /// started) is earlier than `older_than`, optionally limited to one batch
    async fn find_stale(
        &self,
        batch_id: Option<Uuid>,
        statuses: &[CallStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Call>, DomainError>;

    /// Compare-and-set write
    ///
    /// Persists every mutable field of `call` only if the stored version still
    /// equals `call.version`, bumping it by one. Returns `false` when another
    /// writer got there first.
    async fn update_if_version(&self, call: &Call) -> Result<bool, DomainError>;
}
