//! Callwave HTTP Models
//!
//! - Batch: a group of outbound calls
//! - Call: one call attempt and its transcript
//! - Webhook: provider acknowledgement

mod batch;
mod call;
mod webhook;

pub use batch::*;
pub use call::*;
pub use webhook::*;
