//! Batch Aggregate Tracker
//!
//! Applies counter deltas and detects batch completion. Counters only move
//! through atomic store increments; completion is a conditional write so
//! that exactly one caller observes the transition.

use std::sync::Arc;
use uuid::Uuid;

use callwave::{BatchRepository, CallRepository, CallStatus, CounterDelta, DomainError};

pub struct BatchTracker<C: CallRepository, B: BatchRepository> {
    calls: Arc<C>,
    batches: Arc<B>,
}

impl<C: CallRepository, B: BatchRepository> Clone for BatchTracker<C, B> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            batches: self.batches.clone(),
        }
    }
}

impl<C: CallRepository, B: BatchRepository> BatchTracker<C, B> {
    pub fn new(calls: Arc<C>, batches: Arc<B>) -> Self {
        Self { calls, batches }
    }

    pub async fn apply_counter_delta(
        &self,
        batch_id: Uuid,
        delta: CounterDelta,
    ) -> Result<(), DomainError> {
        if delta.is_zero() {
            return Ok(());
        }
        self.batches.increment_counters(batch_id, delta).await
    }

    /// Complete the batch if every call is terminal
    ///
    /// Returns `true` only for the invocation that performed the transition;
    /// repeated or concurrent checks of a completed batch are no-ops.
    pub async fn check_completion(&self, batch_id: Uuid) -> Result<bool, DomainError> {
        let batch = self
            .batches
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Batch", batch_id))?;

        if batch.is_completed() {
            return Ok(false);
        }

        let calls = self.calls.find_by_batch(batch_id).await?;
        if calls.iter().any(|c| !c.is_terminal()) {
            return Ok(false);
        }

        let successful = calls
            .iter()
            .filter(|c| c.status == CallStatus::Completed)
            .count() as i32;
        let failed = calls.len() as i32 - successful;

        if successful != batch.successful_calls || failed != batch.failed_calls {
            tracing::warn!(
                "⚠️  Batch {} counters drifted ({}/{} recorded, {}/{} counted), reconciling",
                batch_id,
                batch.successful_calls,
                batch.failed_calls,
                successful,
                failed
            );
        }

        let completed = self
            .batches
            .mark_completed(batch_id, successful, failed)
            .await?;

        if completed {
            tracing::info!(
                "🏁 Batch {} completed: {} successful, {} failed",
                batch_id,
                successful,
                failed
            );
        }

        Ok(completed)
    }

    /// Run a completion check and report whether the batch is completed now,
    /// whichever caller performed the transition
    pub async fn settle_completion(&self, batch_id: Uuid) -> Result<bool, DomainError> {
        if self.check_completion(batch_id).await? {
            return Ok(true);
        }
        Ok(self
            .batches
            .find_by_id(batch_id)
            .await?
            .is_some_and(|batch| batch.is_completed()))
    }
}
