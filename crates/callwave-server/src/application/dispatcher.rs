//! Dispatch Orchestrator
//!
//! Walks a batch's queued calls one at a time: claim the call (queued →
//! ringing through the lifecycle, so a concurrent stop wins cleanly),
//! trigger it at the provider, record the outcome and pace before the next
//! trigger. A failure on one call never aborts the rest of the batch.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use callwave::{
    Batch, BatchRepository, BatchStatus, Call, CallDetails, CallInput, CallRepository, CallStatus,
    DomainError, ProviderGateway, TriggerMetadata, TriggerRequest,
};

use super::{CallLifecycle, LifecycleOutcome};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Pause between two provider triggers
    pub inter_call_delay: Duration,
    /// Extra attempts when the provider is unavailable
    pub trigger_max_retries: u32,
    /// First backoff step; doubles per retry
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inter_call_delay: Duration::from_millis(1500),
            trigger_max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(10),
        }
    }
}

impl DispatchConfig {
    fn backoff(&self, retry: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(1u32 << retry.min(16))
            .min(self.retry_max_delay)
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DispatchSummary {
    pub batch_id: Uuid,
    /// Calls accepted by the provider
    pub triggered: usize,
    /// Calls marked failed because the trigger failed
    pub failed: usize,
    /// Calls no longer queued when their turn came (e.g. stopped)
    pub skipped: usize,
    /// Calls left untouched because of a store error
    pub errors: usize,
    pub batch_completed: bool,
}

enum CallDispatch {
    Triggered,
    TriggerFailed,
    /// Canceled locally while the trigger was in flight
    StoppedInFlight,
}

pub struct Dispatcher<C: CallRepository, B: BatchRepository, G: ProviderGateway> {
    calls: Arc<C>,
    batches: Arc<B>,
    gateway: Arc<G>,
    lifecycle: CallLifecycle<C, B>,
    config: DispatchConfig,
}

impl<C: CallRepository, B: BatchRepository, G: ProviderGateway> Clone for Dispatcher<C, B, G> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            batches: self.batches.clone(),
            gateway: self.gateway.clone(),
            lifecycle: self.lifecycle.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C, B, G> Dispatcher<C, B, G>
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
        config: DispatchConfig,
    ) -> Self {
        Self {
            calls,
            batches,
            gateway,
            lifecycle,
            config,
        }
    }

    /// Checks shared by a fresh dispatch and a resume
    async fn prepare(&self, batch_id: Uuid) -> Result<Batch, DomainError> {
        let batch = self
            .batches
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Batch", batch_id))?;

        if batch.is_completed() {
            return Err(DomainError::Conflict(format!(
                "Batch {batch_id} is already completed"
            )));
        }

        if !self.gateway.is_configured() {
            return Err(DomainError::ConfigurationMissing(
                "Provider credentials (PROVIDER_API_KEY, PROVIDER_BASE_URL)".to_string(),
            ));
        }

        Ok(batch)
    }

    /// Claim a fresh batch (`created → dispatching`)
    ///
    /// Exactly one caller wins the claim; the others get `Conflict`, so a
    /// batch never runs two dispatch loops at once. Errors surface before
    /// any call is touched.
    pub async fn claim_batch(&self, batch_id: Uuid) -> Result<Batch, DomainError> {
        let mut batch = self.prepare(batch_id).await?;

        if !self.batches.mark_dispatching(batch_id).await? {
            return Err(DomainError::Conflict(format!(
                "Batch {batch_id} is already dispatching"
            )));
        }
        batch.status = BatchStatus::Dispatching;

        tracing::info!("🚀 Dispatching batch {} ({} calls)", batch.id, batch.total_calls);
        Ok(batch)
    }

    /// Claim a fresh batch and trigger its queued calls
    pub async fn dispatch(&self, batch_id: Uuid) -> Result<DispatchSummary, DomainError> {
        let batch = self.claim_batch(batch_id).await?;
        self.run(batch).await
    }

    /// Continue a batch left `dispatching` by an earlier process
    pub async fn resume(&self, batch_id: Uuid) -> Result<DispatchSummary, DomainError> {
        let batch = self.prepare(batch_id).await?;

        if batch.status != BatchStatus::Dispatching {
            return Err(DomainError::Conflict(format!(
                "Batch {batch_id} is not dispatching"
            )));
        }

        tracing::info!("🔁 Resuming dispatch of batch {}", batch.id);
        self.run(batch).await
    }

    /// Trigger every queued call of a claimed batch, sequentially
    async fn run(&self, batch: Batch) -> Result<DispatchSummary, DomainError> {
        let batch_id = batch.id;
        let queued = self
            .calls
            .find_by_batch_and_status(batch_id, &[CallStatus::Queued])
            .await?;

        let mut summary = DispatchSummary {
            batch_id,
            ..DispatchSummary::default()
        };
        let mut triggered_any = false;

        for call in queued {
            let call_id = call.id;

            let claimed = match self.claim(call).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!("❌ Failed to claim call {}: {}", call_id, e);
                    summary.errors += 1;
                    continue;
                }
            };

            if triggered_any {
                tokio::time::sleep(self.config.inter_call_delay).await;
            }
            triggered_any = true;

            match self.trigger_claimed(&batch, claimed).await {
                Ok(CallDispatch::Triggered) => summary.triggered += 1,
                Ok(CallDispatch::TriggerFailed) => summary.failed += 1,
                Ok(CallDispatch::StoppedInFlight) => summary.skipped += 1,
                Err(e) => {
                    tracing::error!("❌ Failed to record dispatch of call {}: {}", call_id, e);
                    summary.errors += 1;
                }
            }
        }

        summary.batch_completed = self.lifecycle.tracker().settle_completion(batch_id).await?;

        tracing::info!(
            "📤 Batch {} dispatch finished: {} triggered, {} failed, {} skipped, {} errors",
            batch_id,
            summary.triggered,
            summary.failed,
            summary.skipped,
            summary.errors
        );

        Ok(summary)
    }

    /// Run the queued calls of a claimed batch in the background
    pub fn spawn(&self, batch: Batch) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let batch_id = batch.id;
            if let Err(e) = dispatcher.run(batch).await {
                tracing::error!("❌ Dispatch of batch {} aborted: {}", batch_id, e);
            }
        })
    }

    /// Run [`Dispatcher::resume`] in the background
    pub fn spawn_resume(&self, batch_id: Uuid) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.resume(batch_id).await {
                tracing::error!("❌ Resumed dispatch of batch {} aborted: {}", batch_id, e);
            }
        })
    }

    /// Batches interrupted mid-dispatch (e.g. by a restart)
    pub async fn interrupted_batches(&self) -> Result<Vec<Batch>, DomainError> {
        self.batches.find_by_status(BatchStatus::Dispatching).await
    }

    /// queued → ringing; `None` if the call was no longer queued
    async fn claim(&self, call: Call) -> Result<Option<Call>, DomainError> {
        match self
            .lifecycle
            .apply_loaded(call, CallInput::Ringing, chrono::Utc::now())
            .await?
        {
            LifecycleOutcome::Applied { call, .. } if call.status == CallStatus::Ringing => {
                Ok(Some(call))
            }
            outcome => {
                tracing::debug!(
                    "Call {} not dispatched, status {}",
                    outcome.call().id,
                    outcome.call().status
                );
                Ok(None)
            }
        }
    }

    async fn trigger_claimed(&self, batch: &Batch, call: Call) -> Result<CallDispatch, DomainError> {
        let request = TriggerRequest {
            phone_number: call.phone_number.clone(),
            metadata: TriggerMetadata {
                internal_call_id: call.id,
                batch_id: batch.id,
                message: call.message.clone().or_else(|| batch.message.clone()),
                reg_no: call.reg_no.clone(),
            },
        };

        let external_call_id = match self.trigger_with_retry(&request).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("⚠️  Trigger failed for call {}: {}", call.id, e);
                self.lifecycle
                    .apply(
                        call.id,
                        CallInput::Failed {
                            error: format!("Trigger failed: {e}"),
                            details: CallDetails::default(),
                        },
                    )
                    .await?;
                return Ok(CallDispatch::TriggerFailed);
            }
        };

        let outcome = self
            .lifecycle
            .apply(
                call.id,
                CallInput::Active {
                    external_call_id: Some(external_call_id.clone()),
                },
            )
            .await?;

        if outcome.call().status == CallStatus::Canceled {
            tracing::warn!(
                "🛑 Call {} was stopped while triggering, canceling {}",
                call.id,
                external_call_id
            );
            if let Err(e) = self.gateway.cancel(&external_call_id).await {
                tracing::warn!("⚠️  Provider cancel of {} failed: {}", external_call_id, e);
            }
            return Ok(CallDispatch::StoppedInFlight);
        }

        tracing::info!("☎️  Call {} triggered as {}", call.id, external_call_id);
        Ok(CallDispatch::Triggered)
    }

    async fn trigger_with_retry(&self, request: &TriggerRequest) -> Result<String, DomainError> {
        let mut retry = 0;
        loop {
            match self.gateway.trigger(request).await {
                Ok(id) => return Ok(id),
                Err(e) if e.is_retryable() && retry < self.config.trigger_max_retries => {
                    let delay = self.config.backoff(retry);
                    retry += 1;
                    tracing::warn!(
                        "🔄 Provider unavailable for {} (retry {}/{} in {:?}): {}",
                        request.metadata.internal_call_id,
                        retry,
                        self.config.trigger_max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
