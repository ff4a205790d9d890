//! Provider Webhook Processor
//!
//! Normalizes an inbound notification, finds the call it belongs to and
//! feeds it through the lifecycle. Never fails: every outcome is something
//! the intake can acknowledge, so the provider stops redelivering.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use callwave::{
    normalize_event, BatchRepository, Call, CallIdentity, CallInput, CallRepository, CallStatus,
    DomainError,
};

use super::{CallLifecycle, LifecycleOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied {
        call_id: Uuid,
        status: CallStatus,
    },
    /// Harmless: unknown shape, unknown call, duplicate or stale event
    Skipped {
        call_id: Option<Uuid>,
        reason: String,
    },
    /// Store failure while handling a valid event
    Failed { reason: String },
}

pub struct WebhookProcessor<C: CallRepository, B: BatchRepository> {
    calls: Arc<C>,
    lifecycle: CallLifecycle<C, B>,
}

impl<C: CallRepository, B: BatchRepository> Clone for WebhookProcessor<C, B> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<C: CallRepository, B: BatchRepository> WebhookProcessor<C, B> {
    pub fn new(calls: Arc<C>, lifecycle: CallLifecycle<C, B>) -> Self {
        Self { calls, lifecycle }
    }

    pub async fn process(&self, body: &Value) -> WebhookOutcome {
        let Some(event) = normalize_event(body) else {
            return skipped(None, "no recognizable event type or call identity");
        };

        let Some(input) = CallInput::from_event(&event) else {
            tracing::debug!("Ignoring provider event {}", event.kind);
            return skipped(None, &format!("unhandled event ({})", event.kind));
        };

        let call = match self.resolve(&event.identity).await {
            Ok(Some(call)) => call,
            Ok(None) => {
                let error = DomainError::UnknownCallIdentity(describe(&event.identity));
                tracing::warn!("⚠️  Webhook {} skipped: {}", event.kind, error);
                return skipped(None, &error.to_string());
            }
            Err(e) => {
                tracing::error!("❌ Webhook call lookup failed: {}", e);
                return WebhookOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let call_id = call.id;
        match self.lifecycle.apply_loaded(call, input, Utc::now()).await {
            Ok(LifecycleOutcome::Applied { call, .. }) => WebhookOutcome::Applied {
                call_id,
                status: call.status,
            },
            Ok(LifecycleOutcome::Skipped { reason, .. }) => {
                tracing::debug!("Webhook {} for call {} skipped: {}", event.kind, call_id, reason);
                skipped(Some(call_id), &reason)
            }
            Err(e) => {
                tracing::error!("❌ Webhook {} for call {} failed: {}", event.kind, call_id, e);
                WebhookOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Internal id, then provider id, then registration number
    async fn resolve(&self, identity: &CallIdentity) -> Result<Option<Call>, DomainError> {
        if let Some(id) = identity.internal_call_id {
            if let Some(call) = self.calls.find_by_id(id).await? {
                return Ok(Some(call));
            }
        }

        if let Some(external_call_id) = identity.external_call_id.as_deref() {
            if let Some(call) = self.calls.find_by_external_id(external_call_id).await? {
                return Ok(Some(call));
            }
        }

        if let Some(reg_no) = identity.reg_no.as_deref() {
            return self.calls.find_latest_open_by_reg_no(reg_no).await;
        }

        Ok(None)
    }
}

fn skipped(call_id: Option<Uuid>, reason: &str) -> WebhookOutcome {
    WebhookOutcome::Skipped {
        call_id,
        reason: reason.to_string(),
    }
}

fn describe(identity: &CallIdentity) -> String {
    let mut parts = Vec::new();
    if let Some(id) = identity.internal_call_id {
        parts.push(format!("call_id={id}"));
    }
    if let Some(id) = &identity.external_call_id {
        parts.push(format!("external_call_id={id}"));
    }
    if let Some(reg_no) = &identity.reg_no {
        parts.push(format!("reg_no={reg_no}"));
    }
    parts.join(", ")
}
