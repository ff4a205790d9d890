//! Adapters Layer
//!
//! Concrete implementations of the domain ports.

#[cfg(test)]
pub mod memory;
pub mod postgres;
mod provider;

pub use postgres::{PgBatchRepository, PgCallRepository, PgChangeFeed};
pub use provider::HttpProviderGateway;
