//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Entities**: The job record and its lifecycle invariants
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Repository Traits**: Persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`job`]: Job identity, lifecycle state machine, and the store contract
//! - [`parameters`]: Tunable parameter ranges and grid expansion

pub mod job;
pub mod parameters;
