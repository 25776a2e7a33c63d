//! Environment DTOs

use serde::{Deserialize, Serialize};

use crate::domain::environment::Environment;

/// Environments available for building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentList {
    pub environments: Vec<Environment>,
}
