//! Infrastructure Layer
//!
//! Adapters (implementations) for the contracts defined by the inner layers.
//! Following hexagonal architecture:
//!
//! - **Driven Adapters (Outbound)**: Implement store and port contracts
//!   - `persistence/`: Job store backends (in-memory, `PostgreSQL`)
//!
//! - **Composition**:
//!   - `config/`: Dependency injection container

pub mod config;
pub mod persistence;
