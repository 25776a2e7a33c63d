//! Build orchestration errors

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced synchronously by the orchestrator
///
/// Build-tool failures are not errors: they are recorded on the build itself.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The request was malformed or named an unknown environment
    #[error("Invalid build request: {0}")]
    Validation(String),

    /// No build exists with this identifier
    #[error("Build {0} not found")]
    NotFound(Uuid),

    /// The registry broke one of its own invariants
    #[error("Build registry corrupted: {0}")]
    RegistryCorruption(String),
}

pub type Result<T> = std::result::Result<T, BuildError>;
