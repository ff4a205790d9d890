//! Repository Ports
//!
//! Abstract interfaces for data persistence operations.

mod batch_repository;
mod call_repository;

pub use batch_repository::*;
pub use call_repository::*;
