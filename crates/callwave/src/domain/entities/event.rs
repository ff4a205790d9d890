//! CanonicalEvent - shape-independent form of a provider notification
//!
//! Produced by the normalizer, consumed once by the state machine, never stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::EventKind;

/// Everything an event carries that can identify its call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallIdentity {
    /// Our own call id, echoed back through provider metadata
    pub internal_call_id: Option<Uuid>,
    /// Provider call / session id
    pub external_call_id: Option<String>,
    /// Customer reference, last-resort matching key
    pub reg_no: Option<String>,
}

impl CallIdentity {
    pub fn is_empty(&self) -> bool {
        self.internal_call_id.is_none()
            && self.external_call_id.is_none()
            && self.reg_no.is_none()
    }
}

/// Media and outcome details reported for a call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallDetails {
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i32>,
    /// Provider-side status string, uninterpreted
    pub status: Option<String>,
}

impl CallDetails {
    pub fn is_empty(&self) -> bool {
        self.transcript.is_none() && self.recording_url.is_none() && self.duration_seconds.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub identity: CallIdentity,
    pub status_hint: Option<String>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub error_message: Option<String>,
}

impl CanonicalEvent {
    pub fn details(&self) -> CallDetails {
        CallDetails {
            transcript: self.transcript.clone(),
            recording_url: self.recording_url.clone(),
            duration_seconds: self.duration_seconds,
            status: self.status_hint.clone(),
        }
    }
}
