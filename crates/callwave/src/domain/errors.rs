//! Domain Errors
//!
//! Error types for domain operations.

use thiserror::Error;
use uuid::Uuid;

use super::value_objects::CallStatus;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    /// Network failure or non-2xx answer from the voice provider
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An inbound event could not be matched to any known call
    #[error("Unknown call identity: {0}")]
    UnknownCallIdentity(String),

    /// Attempted to leave a terminal status, or to switch terminal statuses
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: CallStatus, to: CallStatus },

    /// A required credential or setting is absent
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl DomainError {
    pub fn not_found<T: AsRef<str>>(entity_type: T, id: Uuid) -> Self {
        Self::NotFound {
            entity_type: entity_type.as_ref().to_string(),
            id: id.to_string(),
        }
    }

    pub fn not_found_str<T: AsRef<str>>(entity_type: T, id: &str) -> Self {
        Self::NotFound {
            entity_type: entity_type.as_ref().to_string(),
            id: id.to_string(),
        }
    }

    /// Whether retrying the same provider request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}
