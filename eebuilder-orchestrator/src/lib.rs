//! EE Builder Orchestrator
//!
//! Accepts build requests for execution environments, runs the build tool
//! once per environment and tracks every build until it reaches a terminal
//! state.
//!
//! Layers:
//! - Repository: in-memory build registry and the environment catalog
//! - Runner: spawns the external build tool
//! - Service: build execution, log capture and the public orchestrator API
//! - API: thin HTTP mapping over the service layer

pub mod api;
pub mod config;
pub mod error;
pub mod repository;
pub mod runner;
pub mod service;

pub use error::BuildError;
pub use service::Orchestrator;
