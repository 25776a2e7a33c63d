//! Build DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::build::{BuildJob, BuildListItem, BuildStatus, ContainerRuntime};

/// Request to build one or more environments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub environments: Vec<String>,
    #[serde(default)]
    pub container_runtime: ContainerRuntime,
}

impl BuildRequest {
    pub fn new<I, S>(environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            environments: environments.into_iter().map(Into::into).collect(),
            container_runtime: ContainerRuntime::default(),
        }
    }

    pub fn with_runtime(mut self, container_runtime: ContainerRuntime) -> Self {
        self.container_runtime = container_runtime;
        self
    }
}

/// Response to a build submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResponse {
    pub build_id: Uuid,
    pub status: BuildStatus,
    pub environments: Vec<String>,
    pub message: String,
}

impl From<&BuildJob> for BuildResponse {
    fn from(job: &BuildJob) -> Self {
        Self {
            build_id: job.build_id,
            status: job.status,
            environments: job.environments.clone(),
            message: format!(
                "Build started for {} environment(s)",
                job.environments.len()
            ),
        }
    }
}

/// Build listing, most recent first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildList {
    pub builds: Vec<BuildListItem>,
}

/// Response to a cancellation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub build_id: Uuid,
    pub status: BuildStatus,
    pub message: String,
}
