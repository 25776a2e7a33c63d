//! Repository Module
//!
//! State owned by the orchestrator: the build registry and the catalog of
//! buildable environments.

pub mod build;
pub mod environment;

// Re-export for convenience
pub use build::JobRegistry;
pub use environment::{EnvironmentCatalog, FsEnvironmentCatalog};
