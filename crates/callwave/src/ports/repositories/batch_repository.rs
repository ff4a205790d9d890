//! Batch Repository Port
//!
//! Abstract interface for Batch persistence operations.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{errors::DomainError, Batch, BatchStatus, Call, CounterDelta};

/// Repository interface for Batch aggregates
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Insert a batch together with all of its (queued) calls
    async fn create(&self, batch: &Batch, calls: &[Call]) -> Result<Batch, DomainError>;

    /// Find a batch by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Batch>, DomainError>;

    /// All batches, newest first
    async fn find_all(&self) -> Result<Vec<Batch>, DomainError>;

    /// Batches currently in `status`
    async fn find_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>, DomainError>;

    /// Move a batch from created to dispatching; `false` if it was not created
    async fn mark_dispatching(&self, id: Uuid) -> Result<bool, DomainError>;

    /// Atomically add `delta` to the batch counters
    ///
    /// Must be an in-store increment, never read-then-write.
    async fn increment_counters(&self, id: Uuid, delta: CounterDelta) -> Result<(), DomainError>;

    /// Mark the batch completed with reconciled counters
    ///
    /// Conditional on the batch not being completed yet; returns `true` only
    /// for the caller whose write performed the transition.
    async fn mark_completed(
        &self,
        id: Uuid,
        successful_calls: i32,
        failed_calls: i32,
    ) -> Result<bool, DomainError>;
}
