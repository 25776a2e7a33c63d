//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services drive builds through the runner and keep the registry current.

pub mod build;
pub mod job;
pub mod lock;
pub mod log;

pub use build::{CancelAck, Orchestrator};
pub use lock::ExecutionPolicy;
