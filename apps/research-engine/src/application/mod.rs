//! Application Layer
//!
//! The application layer defines the ports through which job execution talks
//! to the outside world:
//!
//! - **Ports**: Interfaces for the evaluator, dataset repository, and
//!   strategy registry consumed while a job runs

pub mod ports;
