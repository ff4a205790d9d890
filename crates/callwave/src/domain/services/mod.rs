//! Domain Services
//!
//! Pure logic over domain entities: the call lifecycle state machine and the
//! provider payload normalizer.

pub mod normalizer;
mod state_machine;

pub use normalizer::normalize_event;
pub use state_machine::*;
