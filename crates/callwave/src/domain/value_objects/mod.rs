//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod batch_status;
mod call_status;
mod event_kind;

pub use batch_status::*;
pub use call_status::*;
pub use event_kind::*;
