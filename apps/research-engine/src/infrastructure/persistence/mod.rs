//! Persistence Adapters
//!
//! Job store backends implementing [`JobStore`](crate::domain::job::JobStore).

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;
