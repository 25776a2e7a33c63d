//! Build domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Build record
///
/// One record per submitted batch of environments. The orchestrator owns the
/// authoritative copy; everything else works on clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildJob {
    pub build_id: Uuid,
    pub status: BuildStatus,
    pub environments: Vec<String>,
    #[serde(default)]
    pub container_runtime: ContainerRuntime,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub return_code: Option<i32>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub successful_builds: Vec<String>,
    #[serde(default)]
    pub failed_builds: Vec<String>,
    #[serde(default)]
    pub cancel_requested: bool,
}

impl BuildJob {
    /// Creates a fresh record in the `running` state
    pub fn new(build_id: Uuid, environments: Vec<String>, container_runtime: ContainerRuntime) -> Self {
        Self {
            build_id,
            status: BuildStatus::Running,
            environments,
            container_runtime,
            start_time: chrono::Utc::now(),
            end_time: None,
            return_code: None,
            logs: Vec::new(),
            successful_builds: Vec::new(),
            failed_builds: Vec::new(),
            cancel_requested: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of environments already placed in either outcome set
    pub fn classified_count(&self) -> usize {
        self.successful_builds.len() + self.failed_builds.len()
    }

    pub fn is_classified(&self, environment: &str) -> bool {
        self.successful_builds.iter().any(|e| e == environment)
            || self.failed_builds.iter().any(|e| e == environment)
    }

    /// Appends a log line. Returns `false` once the build is terminal.
    pub fn append_log(&mut self, line: String) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.logs.push(line);
        true
    }

    /// Places an environment into the success or failure set based on its exit code
    ///
    /// Returns `false` (and changes nothing) when the build is terminal, the
    /// environment was not requested, or it was already classified.
    pub fn record_outcome(&mut self, environment: &str, exit_code: i32) -> bool {
        if self.is_terminal()
            || !self.environments.iter().any(|e| e == environment)
            || self.is_classified(environment)
        {
            return false;
        }

        if exit_code == 0 {
            self.successful_builds.push(environment.to_string());
        } else {
            self.failed_builds.push(environment.to_string());
        }
        true
    }

    /// Moves the build into a terminal state
    ///
    /// Terminal states are final: returns `false` if the build already left
    /// `running` or if `status` is not terminal. `return_code` is dropped for
    /// cancelled builds.
    pub fn finish(&mut self, status: BuildStatus, return_code: Option<i32>) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }

        self.status = status;
        self.end_time = Some(chrono::Utc::now());
        self.return_code = match status {
            BuildStatus::Cancelled => None,
            _ => return_code,
        };
        true
    }
}

/// Build lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BuildStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Running => "running",
            BuildStatus::Completed => "completed",
            BuildStatus::Failed => "failed",
            BuildStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container runtime handed to the build tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    #[default]
    Podman,
    Docker,
}

impl ContainerRuntime {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerRuntime::Podman => "podman",
            ContainerRuntime::Docker => "docker",
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerRuntime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "podman" => Ok(ContainerRuntime::Podman),
            "docker" => Ok(ContainerRuntime::Docker),
            other => Err(format!(
                "Unknown container runtime '{}' (expected 'podman' or 'docker')",
                other
            )),
        }
    }
}

/// Build summary for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildListItem {
    pub build_id: Uuid,
    pub status: BuildStatus,
    pub environments: Vec<String>,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub environment_count: usize,
}

impl From<&BuildJob> for BuildListItem {
    fn from(job: &BuildJob) -> Self {
        Self {
            build_id: job.build_id,
            status: job.status,
            environments: job.environments.clone(),
            start_time: job.start_time,
            end_time: job.end_time,
            environment_count: job.environments.len(),
        }
    }
}
