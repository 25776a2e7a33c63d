//! Data Transfer Objects
//!
//! Request and response bodies exchanged between the orchestrator and its
//! callers (web UI, client library, CLI).

pub mod build;
pub mod environment;
