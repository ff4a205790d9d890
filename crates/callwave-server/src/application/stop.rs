//! Emergency Stop
//!
//! Halts a batch: fires provider cancels for every live call without
//! waiting on them, cancels every non-terminal call locally and completes
//! the batch.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use callwave::{
    BatchRepository, CallInput, CallRepository, CallStatus, DomainError, ProviderGateway,
};

use super::CallLifecycle;

pub const STOP_REASON: &str = "Stopped by user";

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct StopSummary {
    pub batch_id: Uuid,
    /// Calls moved to canceled by this stop
    pub canceled: usize,
    /// Provider cancels fired (not awaited)
    pub provider_cancels: usize,
    /// Batch is completed once the stop returns
    pub batch_completed: bool,
}

pub struct EmergencyStop<C: CallRepository, B: BatchRepository, G: ProviderGateway> {
    calls: Arc<C>,
    batches: Arc<B>,
    gateway: Arc<G>,
    lifecycle: CallLifecycle<C, B>,
}

impl<C: CallRepository, B: BatchRepository, G: ProviderGateway> Clone for EmergencyStop<C, B, G> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            batches: self.batches.clone(),
            gateway: self.gateway.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<C, B, G> EmergencyStop<C, B, G>
where
    C: CallRepository + 'static,
    B: BatchRepository + 'static,
    G: ProviderGateway + 'static,
{
    pub fn new(
        calls: Arc<C>,
        batches: Arc<B>,
        gateway: Arc<G>,
        lifecycle: CallLifecycle<C, B>,
    ) -> Self {
        Self {
            calls,
            batches,
            gateway,
            lifecycle,
        }
    }

    pub async fn stop(&self, batch_id: Uuid) -> Result<StopSummary, DomainError> {
        self.batches
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Batch", batch_id))?;

        let open = self
            .calls
            .find_by_batch_and_status(batch_id, &CallStatus::NON_TERMINAL)
            .await?;

        tracing::warn!(
            "🛑 Emergency stop of batch {}: {} open calls",
            batch_id,
            open.len()
        );

        let mut summary = StopSummary {
            batch_id,
            ..StopSummary::default()
        };

        for external_call_id in open.iter().filter_map(|c| c.external_call_id.clone()) {
            let gateway = self.gateway.clone();
            tokio::spawn(async move {
                if let Err(e) = gateway.cancel(&external_call_id).await {
                    tracing::warn!("⚠️  Provider cancel of {} failed: {}", external_call_id, e);
                }
            });
            summary.provider_cancels += 1;
        }

        for call in open {
            let call_id = call.id;
            let input = CallInput::Canceled {
                reason: STOP_REASON.to_string(),
            };
            match self.lifecycle.apply_loaded(call, input, Utc::now()).await {
                Ok(outcome) if outcome.is_applied() => summary.canceled += 1,
                Ok(_) => {}
                Err(e) => tracing::error!("❌ Failed to cancel call {}: {}", call_id, e),
            }
        }

        summary.batch_completed = self.lifecycle.tracker().settle_completion(batch_id).await?;

        tracing::info!(
            "🛑 Batch {} stopped: {} calls canceled",
            batch_id,
            summary.canceled
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{FakeGateway, MemoryStore};
    use crate::application::BatchTracker;
    use callwave::{BatchStatus, Call};
    use std::time::Duration;

    fn emergency_stop(
        store: &Arc<MemoryStore>,
        gateway: &Arc<FakeGateway>,
    ) -> EmergencyStop<MemoryStore, MemoryStore, FakeGateway> {
        let lifecycle = CallLifecycle::new(
            store.clone(),
            BatchTracker::new(store.clone(), store.clone()),
        );
        EmergencyStop::new(store.clone(), store.clone(), gateway.clone(), lifecycle)
    }

    #[tokio::test]
    async fn test_stop_cancels_active_and_queued_calls() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (batch, calls) = store.seed_batch(&["+1001", "+1002"]).await;
        store.put_call(Call {
            status: CallStatus::Active,
            external_call_id: Some("ext-a".to_string()),
            started_at: Some(Utc::now()),
            ..calls[0].clone()
        });

        let summary = emergency_stop(&store, &gateway).stop(batch.id).await.unwrap();

        assert_eq!(summary.canceled, 2);
        assert_eq!(summary.provider_cancels, 1);
        assert!(summary.batch_completed);
        for call in &calls {
            let stored = store.call(call.id);
            assert_eq!(stored.status, CallStatus::Canceled);
            assert_eq!(stored.error_message.as_deref(), Some(STOP_REASON));
            assert!(stored.completed_at.is_some());
        }
        let stored = store.batch(batch.id);
        assert_eq!(stored.status, BatchStatus::Completed);
        assert_eq!((stored.successful_calls, stored.failed_calls), (0, 2));

        // Cancels are fire-and-forget
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gateway.canceled_ids(), vec!["ext-a".to_string()]);
    }

    #[tokio::test]
    async fn test_stop_keeps_finished_calls() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (batch, calls) = store.seed_batch(&["+1001", "+1002"]).await;
        let stop = emergency_stop(&store, &gateway);
        stop.lifecycle
            .apply(
                calls[0].id,
                CallInput::Completed(callwave::CallDetails {
                    transcript: Some("hello".to_string()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let summary = stop.stop(batch.id).await.unwrap();

        assert_eq!(summary.canceled, 1);
        assert_eq!(store.call(calls[0].id).status, CallStatus::Completed);
        let stored = store.batch(batch.id);
        assert_eq!((stored.successful_calls, stored.failed_calls), (1, 1));
    }

    #[tokio::test]
    async fn test_second_stop_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (batch, _) = store.seed_batch(&["+1001"]).await;
        let stop = emergency_stop(&store, &gateway);

        stop.stop(batch.id).await.unwrap();
        let again = stop.stop(batch.id).await.unwrap();

        assert_eq!(again.canceled, 0);
        assert!(again.batch_completed);
        assert_eq!(store.batch(batch.id).failed_calls, 1);
    }
}
