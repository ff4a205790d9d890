//! Service Ports
//!
//! Interfaces for the voice provider and the store's change notifications.

mod change_feed;
mod provider_gateway;

pub use change_feed::*;
pub use provider_gateway::*;
