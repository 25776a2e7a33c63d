//! Core domain types
//!
//! These types describe builds and environments. They are owned by the
//! orchestrator and handed out as read-only snapshots to the API, the client
//! and the CLI.

pub mod build;
pub mod environment;
