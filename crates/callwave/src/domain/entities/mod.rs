//! Domain Entities
//!
//! Pure domain models without infrastructure dependencies.
//! - Call: one outbound call attempt
//! - Batch: a group of calls dispatched and tracked together
//! - CanonicalEvent: normalized provider notification (ephemeral)

mod batch;
mod call;
mod event;

pub use batch::*;
pub use call::*;
pub use event::*;
