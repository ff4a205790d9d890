//! Callwave API Routes
//!
//! - /callwave/batches - Batch creation, dispatch and emergency stop
//! - /callwave/batches/:id/changes - Change long-poll for client sync
//! - /callwave/calls - Call records and manual transcript fetch
//! - /callwave/watchdog/sweep - Manual stuck-call sweep
//! - /callwave/webhooks/provider - Provider notifications (unauthenticated)

use axum::http::StatusCode;

use callwave::DomainError;

pub mod batch;
pub mod call;
pub mod swagger;
pub mod watchdog;
pub mod webhook;

/// Map a domain error to an HTTP status and message
pub fn error_response(e: DomainError) -> (StatusCode, String) {
    let status = match &e {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Conflict(_) | DomainError::IllegalTransition { .. } => StatusCode::CONFLICT,
        DomainError::ProviderUnavailable(_) | DomainError::ExternalService(_) => {
            StatusCode::BAD_GATEWAY
        }
        DomainError::UnknownCallIdentity(_) => StatusCode::NOT_FOUND,
        DomainError::ConfigurationMissing(_) | DomainError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        tracing::error!("❌ {}", e);
    }

    (status, e.to_string())
}
