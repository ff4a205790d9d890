//! Provider webhook acknowledgement

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::WebhookOutcome;

/// Always returned with 200 so the provider does not redeliver
#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl WebhookAck {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: Some(true),
            reason: Some(reason.into()),
            call_id: None,
            status: None,
        }
    }
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        match outcome {
            WebhookOutcome::Applied { call_id, status } => Self {
                success: true,
                skipped: None,
                reason: None,
                call_id: Some(call_id),
                status: Some(status.to_string()),
            },
            WebhookOutcome::Skipped { call_id, reason } => Self {
                call_id,
                ..Self::skipped(reason)
            },
            WebhookOutcome::Failed { reason } => Self {
                success: false,
                skipped: None,
                reason: Some(reason),
                call_id: None,
                status: None,
            },
        }
    }
}
