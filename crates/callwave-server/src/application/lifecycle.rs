//! Call Lifecycle Service
//!
//! The single write path for call status. Runs the state machine, persists
//! the result with a version compare-and-set, and only when that write wins
//! applies the counter delta and the completion check.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use callwave::{
    BatchRepository, Call, CallInput, CallRepository, CallStateMachine, DomainError, Transition,
    TransitionEffects,
};

use super::BatchTracker;

/// Version conflicts tolerated before giving up on one input
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub enum LifecycleOutcome {
    /// The input changed the stored call
    Applied {
        call: Call,
        effects: TransitionEffects,
    },
    /// Duplicate, stale or illegal input; nothing was written
    Skipped { call: Call, reason: String },
}

impl LifecycleOutcome {
    pub fn call(&self) -> &Call {
        match self {
            LifecycleOutcome::Applied { call, .. } | LifecycleOutcome::Skipped { call, .. } => call,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, LifecycleOutcome::Applied { .. })
    }
}

pub struct CallLifecycle<C: CallRepository, B: BatchRepository> {
    calls: Arc<C>,
    tracker: BatchTracker<C, B>,
    machine: CallStateMachine,
}

impl<C: CallRepository, B: BatchRepository> Clone for CallLifecycle<C, B> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            tracker: self.tracker.clone(),
            machine: self.machine,
        }
    }
}

impl<C: CallRepository, B: BatchRepository> CallLifecycle<C, B> {
    pub fn new(calls: Arc<C>, tracker: BatchTracker<C, B>) -> Self {
        Self {
            calls,
            tracker,
            machine: CallStateMachine::new(),
        }
    }

    pub fn tracker(&self) -> &BatchTracker<C, B> {
        &self.tracker
    }

    /// Apply `input` to the stored call `call_id`
    pub async fn apply(
        &self,
        call_id: Uuid,
        input: CallInput,
    ) -> Result<LifecycleOutcome, DomainError> {
        let call = self.load(call_id).await?;
        self.apply_loaded(call, input, Utc::now()).await
    }

    /// Apply `input` starting from an already loaded call
    ///
    /// A stale `call` only costs one extra round trip: the compare-and-set
    /// fails and the call is re-read.
    pub async fn apply_loaded(
        &self,
        mut call: Call,
        input: CallInput,
        now: DateTime<Utc>,
    ) -> Result<LifecycleOutcome, DomainError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let transition = match self.machine.apply(&call, &input, now) {
                Ok(transition) => transition,
                Err(e @ DomainError::IllegalTransition { .. }) => {
                    tracing::debug!("Call {}: {} ({})", call.id, e, input.label());
                    return Ok(LifecycleOutcome::Skipped {
                        call,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            };

            let applied = match transition {
                Transition::Applied(applied) => applied,
                Transition::AlreadyTerminal { status } => {
                    return Ok(LifecycleOutcome::Skipped {
                        call,
                        reason: format!("already terminal ({status})"),
                    });
                }
                Transition::Ignored { reason, .. } => {
                    return Ok(LifecycleOutcome::Skipped { call, reason });
                }
            };

            if !self.calls.update_if_version(&applied.call).await? {
                tracing::debug!("Call {} changed concurrently, retrying", call.id);
                call = self.load(call.id).await?;
                continue;
            }

            let mut stored = applied.call;
            stored.version += 1;
            let effects = applied.effects;

            if effects.previous_status != effects.new_status {
                tracing::info!(
                    "📞 Call {}: {} → {}",
                    stored.id,
                    effects.previous_status,
                    effects.new_status
                );
            }

            // A lost increment is repaired by the reconcile on completion
            if let Err(e) = self
                .tracker
                .apply_counter_delta(stored.batch_id, effects.counter_delta)
                .await
            {
                tracing::warn!(
                    "⚠️  Failed to update counters of batch {}: {}",
                    stored.batch_id,
                    e
                );
            }

            if effects.requires_batch_completion_check {
                self.tracker.check_completion(stored.batch_id).await?;
            }

            return Ok(LifecycleOutcome::Applied {
                call: stored,
                effects,
            });
        }

        Err(DomainError::Conflict(format!(
            "Call {} kept changing, gave up after {} attempts",
            call.id, MAX_WRITE_ATTEMPTS
        )))
    }

    async fn load(&self, call_id: Uuid) -> Result<Call, DomainError> {
        self.calls
            .find_by_id(call_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Call", call_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use callwave::{CallDetails, CallStatus};

    fn lifecycle(store: &Arc<MemoryStore>) -> CallLifecycle<MemoryStore, MemoryStore> {
        CallLifecycle::new(
            store.clone(),
            BatchTracker::new(store.clone(), store.clone()),
        )
    }

    fn completed(transcript: &str) -> CallInput {
        CallInput::Completed(CallDetails {
            transcript: Some(transcript.to_string()),
            ..CallDetails::default()
        })
    }

    #[tokio::test]
    async fn test_duplicate_completion_counts_once() {
        let store = Arc::new(MemoryStore::new());
        let (batch, calls) = store.seed_batch(&["+1001", "+1002"]).await;
        let lifecycle = lifecycle(&store);

        let first = lifecycle.apply(calls[0].id, completed("hello")).await.unwrap();
        let second = lifecycle.apply(calls[0].id, completed("hello")).await.unwrap();

        assert!(first.is_applied());
        assert!(!second.is_applied());
        assert_eq!(store.batch(batch.id).successful_calls, 1);
        assert_eq!(
            store.call(calls[0].id).final_transcript.as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn test_terminal_status_does_not_regress() {
        let store = Arc::new(MemoryStore::new());
        let (batch, calls) = store.seed_batch(&["+1001", "+1002"]).await;
        let lifecycle = lifecycle(&store);

        lifecycle
            .apply(
                calls[0].id,
                CallInput::Canceled {
                    reason: "Stopped by user".to_string(),
                },
            )
            .await
            .unwrap();

        for input in [
            CallInput::Ringing,
            CallInput::Active {
                external_call_id: None,
            },
            completed("late"),
        ] {
            let outcome = lifecycle.apply(calls[0].id, input).await.unwrap();
            assert!(!outcome.is_applied());
            assert_eq!(outcome.call().status, CallStatus::Canceled);
        }

        let stored = store.batch(batch.id);
        assert_eq!((stored.successful_calls, stored.failed_calls), (0, 1));
    }

    #[tokio::test]
    async fn test_stale_read_retries_against_fresh_state() {
        let store = Arc::new(MemoryStore::new());
        let (batch, calls) = store.seed_batch(&["+1001"]).await;
        let lifecycle = lifecycle(&store);
        let stale = store.call(calls[0].id);

        lifecycle
            .apply(calls[0].id, CallInput::Failed {
                error: "busy".to_string(),
                details: CallDetails::default(),
            })
            .await
            .unwrap();

        // Old snapshot still says queued; the CAS must fail and re-read
        let outcome = lifecycle
            .apply_loaded(stale, completed("hi"), Utc::now())
            .await
            .unwrap();

        assert!(!outcome.is_applied());
        assert_eq!(outcome.call().status, CallStatus::Failed);
        let stored = store.batch(batch.id);
        assert_eq!((stored.successful_calls, stored.failed_calls), (0, 1));
        assert!(stored.is_completed());
    }

    #[tokio::test]
    async fn test_concurrent_terminal_inputs_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let (batch, calls) = store.seed_batch(&["+1001"]).await;
        let lifecycle = lifecycle(&store);
        let snapshot = store.call(calls[0].id);

        let (a, b) = tokio::join!(
            lifecycle.apply_loaded(snapshot.clone(), completed("hello"), Utc::now()),
            lifecycle.apply_loaded(
                snapshot,
                CallInput::Canceled {
                    reason: "Stopped by user".to_string()
                },
                Utc::now()
            )
        );

        let applied = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| o.is_applied())
            .count();
        assert_eq!(applied, 1);
        assert_eq!(store.batch(batch.id).resolved_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_call_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let result = lifecycle(&store).apply(Uuid::new_v4(), CallInput::Ringing).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
