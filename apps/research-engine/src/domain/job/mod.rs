//! Job identity, lifecycle state machine, and the store contract.
//!
//! A [`Job`] is the unit of trackable work. Its lifecycle invariants live on
//! the record itself so every [`JobStore`] backend applies identical
//! semantics; submission payloads ride along on the row as [`BacktestSpec`]
//! or [`OptimizationSpec`].

mod record;
mod spec;
mod status;
mod store;

pub use record::Job;
pub use spec::{BacktestSpec, OptimizationSpec};
pub use status::{JobKind, JobStatus};
pub use store::{DEFAULT_LIST_LIMIT, JobFilter, JobStats, JobStore, StoreError};
