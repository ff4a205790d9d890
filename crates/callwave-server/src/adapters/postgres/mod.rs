//! PostgreSQL Repository Implementations

mod batch_repository;
mod call_repository;
mod change_feed;

pub use batch_repository::PgBatchRepository;
pub use call_repository::PgCallRepository;
pub use change_feed::PgChangeFeed;
