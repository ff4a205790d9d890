//! Application Layer (Use Cases)
//!
//! Orchestrates the domain state machine against the store and the
//! provider. Every call status change goes through `CallLifecycle`.

mod batch_service;
mod dispatcher;
mod lifecycle;
mod stop;
mod tracker;
mod transcript;
mod watchdog;
mod webhook_processor;

#[cfg(test)]
mod scenarios;

pub use batch_service::BatchService;
pub use dispatcher::{DispatchConfig, DispatchSummary, Dispatcher};
pub use lifecycle::{CallLifecycle, LifecycleOutcome};
pub use stop::{EmergencyStop, StopSummary};
pub use tracker::BatchTracker;
pub use transcript::{TranscriptFetch, TranscriptService};
pub use watchdog::{SweepReport, Watchdog, WatchdogPolicy, WatchdogRegistry};
pub use webhook_processor::{WebhookOutcome, WebhookProcessor};
