//! Job Orchestration
//!
//! The orchestrator accepts validated submissions, tracks live jobs in a
//! registry of cancellation tokens, bounds concurrent execution with a
//! semaphore, and drives graceful shutdown. All public job operations go
//! through [`JobOrchestrator`].

mod error;
mod registry;
mod service;

pub use error::OrchestratorError;
pub use registry::JobRegistry;
pub use service::{JobOrchestrator, OptimizationSubmission, OrchestratorSettings};
