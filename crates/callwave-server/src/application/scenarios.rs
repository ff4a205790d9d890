//! End-to-end batch runs across dispatcher, webhooks, watchdog and stop

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use callwave::{BatchStatus, CallStatus, ChangeFeed, NewCall, StoreChange};

use super::*;
use crate::adapters::memory::{FakeGateway, MemoryStore};

struct Harness {
    store: Arc<MemoryStore>,
    gateway: Arc<FakeGateway>,
    batches: BatchService<MemoryStore, MemoryStore>,
    dispatcher: Dispatcher<MemoryStore, MemoryStore, FakeGateway>,
    webhooks: WebhookProcessor<MemoryStore, MemoryStore>,
    watchdog: Watchdog<MemoryStore, MemoryStore, FakeGateway>,
    stop: EmergencyStop<MemoryStore, MemoryStore, FakeGateway>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let lifecycle = CallLifecycle::new(
            store.clone(),
            BatchTracker::new(store.clone(), store.clone()),
        );
        let dispatch_config = DispatchConfig {
            inter_call_delay: Duration::ZERO,
            retry_base_delay: Duration::ZERO,
            ..DispatchConfig::default()
        };

        Self {
            batches: BatchService::new(store.clone(), store.clone()),
            dispatcher: Dispatcher::new(
                store.clone(),
                store.clone(),
                gateway.clone(),
                lifecycle.clone(),
                dispatch_config,
            ),
            webhooks: WebhookProcessor::new(store.clone(), lifecycle.clone()),
            watchdog: Watchdog::new(
                store.clone(),
                gateway.clone(),
                lifecycle.clone(),
                WatchdogPolicy::default(),
            ),
            stop: EmergencyStop::new(store.clone(), store.clone(), gateway.clone(), lifecycle),
            store,
            gateway,
        }
    }

    async fn batch_of(&self, phones: &[&str]) -> (uuid::Uuid, Vec<uuid::Uuid>) {
        let entries = phones
            .iter()
            .map(|p| NewCall {
                phone_number: p.to_string(),
                reg_no: None,
                message: None,
            })
            .collect();
        let (batch, calls) = self
            .batches
            .create("scenario".to_string(), None, entries)
            .await
            .unwrap();
        (batch.id, calls.iter().map(|c| c.id).collect())
    }
}

#[tokio::test]
async fn test_completed_failed_and_timed_out_calls() {
    let h = Harness::new();
    let (batch_id, ids) = h.batch_of(&["+1001", "+1002", "+1003"]).await;

    let summary = h.dispatcher.dispatch(batch_id).await.unwrap();
    assert_eq!(summary.triggered, 3);

    h.webhooks
        .process(&json!({
            "event": "call_ended",
            "call_id": "ext-+1001",
            "transcript": "hello"
        }))
        .await;
    h.webhooks
        .process(&json!({
            "event": "call.failed",
            "metadata": { "call_id": ids[1].to_string() },
            "error": "Callee busy"
        }))
        .await;
    assert_eq!(h.store.batch(batch_id).status, BatchStatus::Dispatching);

    let later = Utc::now() + chrono::Duration::minutes(15);
    let report = h.watchdog.sweep_at(Some(batch_id), later).await.unwrap();
    assert_eq!(report.timed_out, 1);

    let a = h.store.call(ids[0]);
    let b = h.store.call(ids[1]);
    let c = h.store.call(ids[2]);
    assert_eq!(a.status, CallStatus::Completed);
    assert_eq!(a.final_transcript.as_deref(), Some("hello"));
    assert_eq!(b.status, CallStatus::Failed);
    assert_eq!(b.error_message.as_deref(), Some("Callee busy"));
    assert_eq!(c.status, CallStatus::Failed);
    assert!(c.error_message.as_deref().unwrap().contains("timed out"));
    assert_eq!(h.gateway.canceled_ids(), vec!["ext-+1003".to_string()]);

    let batch = h.store.batch(batch_id);
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!((batch.successful_calls, batch.failed_calls), (1, 2));
    assert_eq!(batch.resolved_calls(), batch.total_calls);
}

#[tokio::test]
async fn test_duplicate_completion_webhook_counts_once() {
    let h = Harness::new();
    let (batch_id, ids) = h.batch_of(&["+1001", "+1002"]).await;
    h.dispatcher.dispatch(batch_id).await.unwrap();

    let completed = json!({
        "event": "completed",
        "metadata": { "call_id": ids[0].to_string() },
        "transcript": "hello"
    });
    let first = h.webhooks.process(&completed).await;
    let second = h.webhooks.process(&completed).await;

    assert!(matches!(first, WebhookOutcome::Applied { .. }));
    assert!(matches!(second, WebhookOutcome::Skipped { .. }));
    let batch = h.store.batch(batch_id);
    assert_eq!((batch.successful_calls, batch.failed_calls), (1, 0));
    assert_eq!(batch.status, BatchStatus::Dispatching);
}

#[tokio::test]
async fn test_emergency_stop_with_active_and_queued_calls() {
    let h = Harness::new();
    let (batch_id, ids) = h.batch_of(&["+1001", "+1002"]).await;
    h.webhooks
        .process(&json!({
            "event": "answered",
            "callId": "prov-a",
            "metadata": { "call_id": ids[0].to_string() }
        }))
        .await;
    assert_eq!(h.store.call(ids[0]).status, CallStatus::Active);

    let summary = h.stop.stop(batch_id).await.unwrap();
    assert_eq!(summary.canceled, 2);

    for id in &ids {
        assert_eq!(h.store.call(*id).status, CallStatus::Canceled);
    }
    let batch = h.store.batch(batch_id);
    assert!(batch.is_completed());
    assert_eq!((batch.successful_calls, batch.failed_calls), (0, 2));

    // A late completion webhook cannot resurrect the stopped call
    let late = h
        .webhooks
        .process(&json!({ "event": "completed", "call_id": "prov-a", "transcript": "bye" }))
        .await;
    assert!(matches!(late, WebhookOutcome::Skipped { .. }));
    assert_eq!(h.store.call(ids[0]).status, CallStatus::Canceled);
    assert_eq!(h.store.batch(batch_id).failed_calls, 2);

    // Dispatch after stop has nothing left to do
    assert!(matches!(
        h.dispatcher.dispatch(batch_id).await,
        Err(callwave::DomainError::Conflict(_))
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.gateway.canceled_ids(), vec!["prov-a".to_string()]);
    assert_eq!(h.gateway.trigger_count(), 0);
}

#[tokio::test]
async fn test_change_feed_reports_completion() {
    let h = Harness::new();
    let (batch_id, ids) = h.batch_of(&["+1001"]).await;
    let mut changes = h.store.subscribe();

    h.webhooks
        .process(&json!({
            "event": "failed",
            "metadata": { "call_id": ids[0].to_string() }
        }))
        .await;

    let mut seen = Vec::new();
    while let Ok(change) = changes.try_recv() {
        seen.push(change);
    }
    assert!(seen.contains(&StoreChange::Call {
        id: ids[0],
        batch_id,
        status: CallStatus::Failed,
    }));
    assert!(seen.last().is_some_and(StoreChange::is_batch_completion));
}
