//! Stuck-Call Watchdog
//!
//! Finds calls stranded in a non-terminal status past the deadline, asks the
//! provider to hang up (best-effort) and forces them to `failed` locally.
//! One periodic task runs per dispatching batch; the registry owns their
//! stop handles. Once the batch's dispatch task has finished, calls still
//! `queued` can no longer be picked up and are swept as well.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use callwave::{
    BatchRepository, CallDetails, CallInput, CallRepository, CallStatus, DomainError,
    ProviderGateway,
};

use super::{CallLifecycle, LifecycleOutcome};

pub const TIMEOUT_ERROR: &str = "Call timed out (no provider update before deadline)";

/// Which calls count as stuck, and how often to look
#[derive(Debug, Clone)]
pub struct WatchdogPolicy {
    pub period: Duration,
    /// Measured from `started_at`, or `created_at` for calls never started
    pub deadline: Duration,
    pub eligible_statuses: Vec<CallStatus>,
}

impl Default for WatchdogPolicy {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            deadline: Duration::from_secs(10 * 60),
            eligible_statuses: vec![CallStatus::Ringing, CallStatus::Active],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SweepReport {
    pub examined: usize,
    /// Calls forced to failed by this sweep
    pub timed_out: usize,
    /// Calls that reached a terminal status on their own meanwhile
    pub already_resolved: usize,
    pub cancel_failures: usize,
    pub errors: usize,
}

pub struct Watchdog<C: CallRepository, B: BatchRepository, G: ProviderGateway> {
    calls: Arc<C>,
    gateway: Arc<G>,
    lifecycle: CallLifecycle<C, B>,
    policy: WatchdogPolicy,
}

impl<C: CallRepository, B: BatchRepository, G: ProviderGateway> Clone for Watchdog<C, B, G> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            gateway: self.gateway.clone(),
            lifecycle: self.lifecycle.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<C: CallRepository, B: BatchRepository, G: ProviderGateway> Watchdog<C, B, G> {
    pub fn new(
        calls: Arc<C>,
        gateway: Arc<G>,
        lifecycle: CallLifecycle<C, B>,
        policy: WatchdogPolicy,
    ) -> Self {
        Self {
            calls,
            gateway,
            lifecycle,
            policy,
        }
    }

    /// Sweep one batch, or every batch when `batch_id` is `None`
    pub async fn sweep(&self, batch_id: Option<Uuid>) -> Result<SweepReport, DomainError> {
        self.sweep_at(batch_id, Utc::now()).await
    }

    pub async fn sweep_at(
        &self,
        batch_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, DomainError> {
        self.sweep_statuses(batch_id, now, &self.policy.eligible_statuses)
            .await
    }

    /// Sweep a batch whose dispatch loop is over: `queued` calls are stuck too
    pub async fn sweep_undispatched_at(
        &self,
        batch_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, DomainError> {
        let mut statuses = self.policy.eligible_statuses.clone();
        if !statuses.contains(&CallStatus::Queued) {
            statuses.push(CallStatus::Queued);
        }
        self.sweep_statuses(Some(batch_id), now, &statuses).await
    }

    async fn sweep_statuses(
        &self,
        batch_id: Option<Uuid>,
        now: DateTime<Utc>,
        statuses: &[CallStatus],
    ) -> Result<SweepReport, DomainError> {
        let deadline = chrono::Duration::from_std(self.policy.deadline)
            .map_err(|e| DomainError::Validation(format!("Watchdog deadline out of range: {e}")))?;

        let stuck = self
            .calls
            .find_stale(batch_id, statuses, now - deadline)
            .await?;

        let mut report = SweepReport {
            examined: stuck.len(),
            ..SweepReport::default()
        };

        for call in stuck {
            let call_id = call.id;

            if let Some(external_call_id) = call.external_call_id.as_deref() {
                if let Err(e) = self.gateway.cancel(external_call_id).await {
                    tracing::warn!(
                        "⚠️  Provider cancel of stuck call {} failed: {}",
                        call_id,
                        e
                    );
                    report.cancel_failures += 1;
                }
            }

            let input = CallInput::Failed {
                error: TIMEOUT_ERROR.to_string(),
                details: CallDetails::default(),
            };
            match self.lifecycle.apply_loaded(call, input, now).await {
                Ok(LifecycleOutcome::Applied { .. }) => {
                    tracing::warn!("⏰ Call {} timed out, marked failed", call_id);
                    report.timed_out += 1;
                }
                Ok(LifecycleOutcome::Skipped { .. }) => report.already_resolved += 1,
                Err(e) => {
                    tracing::error!("❌ Failed to time out call {}: {}", call_id, e);
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

struct WatchdogHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Running per-batch watchdog tasks
pub struct WatchdogRegistry<C: CallRepository, B: BatchRepository, G: ProviderGateway> {
    watchdog: Watchdog<C, B, G>,
    batches: Arc<B>,
    running: Arc<Mutex<HashMap<Uuid, WatchdogHandle>>>,
}

impl<C: CallRepository, B: BatchRepository, G: ProviderGateway> Clone
    for WatchdogRegistry<C, B, G>
{
    fn clone(&self) -> Self {
        Self {
            watchdog: self.watchdog.clone(),
            batches: self.batches.clone(),
            running: self.running.clone(),
        }
    }
}

impl<C, B, G> WatchdogRegistry<C, B, G>
where
    C: CallRepository + 'static,
    B: BatchRepository + 'static,
    G: ProviderGateway + 'static,
{
    pub fn new(watchdog: Watchdog<C, B, G>, batches: Arc<B>) -> Self {
        Self {
            watchdog,
            batches,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn watchdog(&self) -> &Watchdog<C, B, G> {
        &self.watchdog
    }

    /// Start the periodic sweep for a batch, watching its dispatch task
    ///
    /// A sweep already running for the batch is replaced, so it always
    /// follows the latest dispatch.
    pub async fn start(&self, batch_id: Uuid, dispatch: JoinHandle<()>) {
        let mut running = self.running.lock().await;
        running.retain(|_, handle| !handle.task.is_finished());

        if let Some(previous) = running.remove(&batch_id) {
            let _ = previous.stop.send(true);
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(Self::run(
            self.watchdog.clone(),
            self.batches.clone(),
            batch_id,
            dispatch,
            stop_rx,
        ));
        running.insert(batch_id, WatchdogHandle { stop, task });

        tracing::info!(
            "🐕 Watchdog started for batch {} (every {:?}, deadline {:?})",
            batch_id,
            self.watchdog.policy.period,
            self.watchdog.policy.deadline
        );
    }

    /// Stop the batch's sweep; returns whether one was running
    pub async fn stop(&self, batch_id: Uuid) -> bool {
        match self.running.lock().await.remove(&batch_id) {
            Some(handle) => {
                let _ = handle.stop.send(true);
                !handle.task.is_finished()
            }
            None => false,
        }
    }

    pub async fn is_running(&self, batch_id: Uuid) -> bool {
        self.running
            .lock()
            .await
            .get(&batch_id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.running.lock().await.len()
    }

    async fn run(
        watchdog: Watchdog<C, B, G>,
        batches: Arc<B>,
        batch_id: Uuid,
        dispatch: JoinHandle<()>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let period = watchdog.policy.period.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        // First tick fires immediately; nothing can be stuck yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }

            let sweep = if dispatch.is_finished() {
                watchdog.sweep_undispatched_at(batch_id, Utc::now()).await
            } else {
                watchdog.sweep(Some(batch_id)).await
            };
            match sweep {
                Ok(report) if report.timed_out > 0 => {
                    tracing::info!(
                        "🐕 Watchdog sweep of batch {}: {} timed out",
                        batch_id,
                        report.timed_out
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️  Watchdog sweep of batch {} failed: {}", batch_id, e),
            }

            // Backstop in case a completion check was lost to a store error
            if let Err(e) = watchdog.lifecycle.tracker().check_completion(batch_id).await {
                tracing::warn!("⚠️  Completion check of batch {} failed: {}", batch_id, e);
            }

            match batches.find_by_id(batch_id).await {
                Ok(Some(batch)) if !batch.is_completed() => {}
                Ok(_) => break,
                Err(e) => tracing::warn!("⚠️  Watchdog could not load batch {}: {}", batch_id, e),
            }
        }

        tracing::info!("🐕 Watchdog stopped for batch {}", batch_id);
    }
}
