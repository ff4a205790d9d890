//! Provider Gateway Port
//!
//! Outbound-only interface to the voice-call provider: trigger, cancel and
//! fetch details. Pure I/O boundary; implementations hold no call state and
//! never mutate calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{errors::DomainError, CallDetails};

/// Metadata echoed back by the provider in its webhooks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerMetadata {
    pub internal_call_id: Uuid,
    pub batch_id: Uuid,
    pub message: Option<String>,
    pub reg_no: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRequest {
    pub phone_number: String,
    pub metadata: TriggerMetadata,
}

/// Voice provider interface
///
/// Every method must be bounded by a timeout.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Place a call; returns the provider's call ID
    async fn trigger(&self, request: &TriggerRequest) -> Result<String, DomainError>;

    /// Ask the provider to hang up a call (best-effort)
    async fn cancel(&self, external_call_id: &str) -> Result<(), DomainError>;

    /// Fetch transcript, recording and duration of a call
    async fn fetch_details(&self, external_call_id: &str) -> Result<CallDetails, DomainError>;

    /// Whether the credentials needed to talk to the provider are present
    fn is_configured(&self) -> bool {
        true
    }
}
