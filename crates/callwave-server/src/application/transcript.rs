//! Manual Transcript Fetch
//!
//! Pulls transcript and media from the provider for a call whose final
//! transcript never arrived by webhook, and stores whatever is missing.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use callwave::{
    BatchRepository, Call, CallInput, CallRepository, DomainError, ProviderGateway,
};

use super::CallLifecycle;

#[derive(Debug, Clone)]
pub enum TranscriptFetch {
    Available(Call),
    /// The provider has no transcript for this call yet
    NotYetAvailable(Call),
}

pub struct TranscriptService<C: CallRepository, B: BatchRepository, G: ProviderGateway> {
    calls: Arc<C>,
    gateway: Arc<G>,
    lifecycle: CallLifecycle<C, B>,
}

impl<C: CallRepository, B: BatchRepository, G: ProviderGateway> Clone
    for TranscriptService<C, B, G>
{
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            gateway: self.gateway.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<C: CallRepository, B: BatchRepository, G: ProviderGateway> TranscriptService<C, B, G> {
    pub fn new(calls: Arc<C>, gateway: Arc<G>, lifecycle: CallLifecycle<C, B>) -> Self {
        Self {
            calls,
            gateway,
            lifecycle,
        }
    }

    pub async fn fetch(&self, call_id: Uuid) -> Result<TranscriptFetch, DomainError> {
        let call = self
            .calls
            .find_by_id(call_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Call", call_id))?;

        if call.final_transcript.is_some() {
            return Ok(TranscriptFetch::Available(call));
        }

        let Some(external_call_id) = call.external_call_id.clone() else {
            return Err(DomainError::Validation(format!(
                "Call {call_id} has not been placed with the provider yet"
            )));
        };

        let details = self.gateway.fetch_details(&external_call_id).await?;
        if details.is_empty() {
            return Ok(TranscriptFetch::NotYetAvailable(call));
        }

        let call = self
            .lifecycle
            .apply_loaded(call, CallInput::Enrich(details), Utc::now())
            .await?
            .call()
            .clone();

        if call.transcript().is_some() {
            tracing::info!("📝 Transcript stored for call {}", call.id);
            Ok(TranscriptFetch::Available(call))
        } else {
            Ok(TranscriptFetch::NotYetAvailable(call))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{FakeGateway, MemoryStore};
    use crate::application::BatchTracker;
    use callwave::{CallDetails, CallStatus};

    fn service(
        store: &Arc<MemoryStore>,
        gateway: &Arc<FakeGateway>,
    ) -> TranscriptService<MemoryStore, MemoryStore, FakeGateway> {
        let lifecycle = CallLifecycle::new(
            store.clone(),
            BatchTracker::new(store.clone(), store.clone()),
        );
        TranscriptService::new(store.clone(), gateway.clone(), lifecycle)
    }

    fn finished_without_transcript(store: &MemoryStore, call: &Call) {
        store.put_call(Call {
            status: CallStatus::Completed,
            external_call_id: Some("ext-1".to_string()),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            ..call.clone()
        });
    }

    #[tokio::test]
    async fn test_fetch_fills_missing_transcript() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (_, calls) = store.seed_batch(&["+1001"]).await;
        finished_without_transcript(&store, &calls[0]);
        gateway.set_details(
            "ext-1",
            CallDetails {
                transcript: Some("agent: hi\nuser: hello".to_string()),
                recording_url: Some("https://cdn.example/rec.mp3".to_string()),
                duration_seconds: Some(42),
                status: Some("ended".to_string()),
            },
        );

        let fetched = service(&store, &gateway).fetch(calls[0].id).await.unwrap();

        let TranscriptFetch::Available(call) = fetched else {
            panic!("expected transcript");
        };
        assert_eq!(call.final_transcript.as_deref(), Some("agent: hi\nuser: hello"));
        let stored = store.call(calls[0].id);
        assert_eq!(stored.duration_seconds, Some(42));
        assert_eq!(stored.status, CallStatus::Completed);
    }

    #[tokio::test]
    async fn test_fetch_reports_not_yet_available() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (_, calls) = store.seed_batch(&["+1001"]).await;
        finished_without_transcript(&store, &calls[0]);

        let fetched = service(&store, &gateway).fetch(calls[0].id).await.unwrap();
        assert!(matches!(fetched, TranscriptFetch::NotYetAvailable(_)));
    }

    #[tokio::test]
    async fn test_stored_transcript_skips_provider() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (_, calls) = store.seed_batch(&["+1001"]).await;
        store.put_call(Call {
            final_transcript: Some("already here".to_string()),
            ..calls[0].clone()
        });
        gateway.set_details(
            "ext-1",
            CallDetails {
                transcript: Some("other".to_string()),
                ..CallDetails::default()
            },
        );

        let fetched = service(&store, &gateway).fetch(calls[0].id).await.unwrap();
        let TranscriptFetch::Available(call) = fetched else {
            panic!("expected stored transcript");
        };
        assert_eq!(call.final_transcript.as_deref(), Some("already here"));
    }

    #[tokio::test]
    async fn test_mid_call_fetch_leaves_final_transcript_to_completion() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (_, calls) = store.seed_batch(&["+1001"]).await;
        store.put_call(Call {
            status: CallStatus::Active,
            external_call_id: Some("ext-1".to_string()),
            started_at: Some(Utc::now()),
            ..calls[0].clone()
        });
        gateway.set_details(
            "ext-1",
            CallDetails {
                transcript: Some("agent: hi".to_string()),
                status: Some("in-progress".to_string()),
                ..CallDetails::default()
            },
        );
        let transcripts = service(&store, &gateway);

        let fetched = transcripts.fetch(calls[0].id).await.unwrap();
        let TranscriptFetch::Available(call) = fetched else {
            panic!("expected live transcript");
        };
        assert_eq!(call.live_transcript.as_deref(), Some("agent: hi"));
        assert!(call.final_transcript.is_none());

        transcripts
            .lifecycle
            .apply(
                calls[0].id,
                CallInput::Completed(CallDetails {
                    transcript: Some("agent: hi\nuser: hello, bye".to_string()),
                    ..CallDetails::default()
                }),
            )
            .await
            .unwrap();

        let stored = store.call(calls[0].id);
        assert_eq!(stored.status, CallStatus::Completed);
        assert_eq!(
            stored.final_transcript.as_deref(),
            Some("agent: hi\nuser: hello, bye")
        );
    }

    #[tokio::test]
    async fn test_unplaced_call_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (_, calls) = store.seed_batch(&["+1001"]).await;

        let result = service(&store, &gateway).fetch(calls[0].id).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
