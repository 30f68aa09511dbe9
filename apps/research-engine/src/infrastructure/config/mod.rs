//! Composition Root
//!
//! Builds and wires concrete adapters into the application. The container is
//! constructed once at startup and threaded through explicitly; there is no
//! global orchestrator instance.

pub mod container;

pub use container::Container;
