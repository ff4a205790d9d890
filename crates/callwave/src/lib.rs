//! Callwave Domain Library
//!
//! Core domain types and interfaces for dispatching batches of outbound
//! phone calls through a third-party voice provider.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure business entities and logic
//!   - `entities/`: Core domain models (Call, Batch, CanonicalEvent)
//!   - `value_objects/`: Immutable value types (CallStatus, BatchStatus, EventKind)
//!   - `services/`: Pure domain services (CallStateMachine, event normalizer)
//!   - `errors/`: Domain-specific error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `repositories/`: Call and batch persistence
//!   - `services/`: Provider gateway and store change feed
//!
//! # Usage
//!
//! ```rust,ignore
//! use callwave::domain::{Call, CallStateMachine, normalize_event};
//! use callwave::ports::{CallRepository, ProviderGateway};
//! ```

pub mod domain;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    normalize_event, AppliedTransition, Batch, BatchStatus, Call, CallDetails, CallIdentity,
    CallInput, CallStateMachine, CallStatus, CanonicalEvent, CounterDelta, DomainError, EventKind,
    NewCall, Transition, TransitionEffects,
};
pub use ports::{
    // Repositories
    BatchRepository,
    CallRepository,
    // Services
    ChangeFeed,
    ProviderGateway,
    StoreChange,
    TriggerMetadata,
    TriggerRequest,
};
