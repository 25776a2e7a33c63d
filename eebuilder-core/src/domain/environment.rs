//! Environment domain types

use serde::{Deserialize, Serialize};

/// An execution environment definition on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub path: String,
    /// Whether the directory holds an `execution-environment.yml` definition
    pub has_execution_environment: bool,
}
