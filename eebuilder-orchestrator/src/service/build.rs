//! Build Service
//!
//! Public entry point of the build engine: submit, query and cancel builds.
//! None of these operations wait for a build to finish.

use eebuilder_core::domain::build::{BuildJob, BuildListItem, BuildStatus};
use eebuilder_core::dto::build::BuildRequest;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{BuildError, Result};
use crate::repository::{EnvironmentCatalog, JobRegistry};
use crate::runner::ProcessRunner;
use crate::service::job::BuildExecutor;
use crate::service::lock::{ExecutionLocks, ExecutionPolicy};

/// Acknowledgement of a cancel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelAck {
    pub build_id: Uuid,
    /// Status at the time of the request
    pub status: BuildStatus,
    /// The build had already finished; nothing was changed
    pub already_terminal: bool,
}

/// Build orchestrator
pub struct Orchestrator {
    registry: Arc<JobRegistry>,
    catalog: Arc<dyn EnvironmentCatalog>,
    executor: Arc<BuildExecutor>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        catalog: Arc<dyn EnvironmentCatalog>,
        runner: Arc<dyn ProcessRunner>,
        policy: ExecutionPolicy,
    ) -> Self {
        let executor = Arc::new(BuildExecutor::new(
            Arc::clone(&registry),
            runner,
            ExecutionLocks::new(policy),
        ));

        Self {
            registry,
            catalog,
            executor,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<dyn EnvironmentCatalog> {
        &self.catalog
    }

    /// Validates the request, registers the build and starts it in the background
    ///
    /// Returns the freshly registered record (status `running`).
    pub async fn submit(&self, mut req: BuildRequest) -> Result<BuildJob> {
        req.environments = self.validate(&req.environments).await?;

        let job = self.registry.create(&req).await?;
        let cancel = self
            .registry
            .cancel_token(job.build_id)
            .await
            .ok_or_else(|| {
                BuildError::RegistryCorruption(format!(
                    "build {} vanished right after registration",
                    job.build_id
                ))
            })?;

        tracing::info!(
            "Build submitted: {} for [{}] using {}",
            job.build_id,
            job.environments.join(", "),
            job.container_runtime
        );

        self.executor.spawn(job.clone(), cancel);

        Ok(job)
    }

    /// Returns the current snapshot of a build
    pub async fn status(&self, id: Uuid) -> Result<BuildJob> {
        self.registry.get(id).await.ok_or(BuildError::NotFound(id))
    }

    pub async fn list(&self) -> Vec<BuildListItem> {
        self.registry.list().await
    }

    /// Requests cancellation of a running build
    ///
    /// Cancelling a finished build succeeds without touching it.
    pub async fn cancel(&self, id: Uuid) -> Result<CancelAck> {
        let token = self
            .registry
            .cancel_token(id)
            .await
            .ok_or(BuildError::NotFound(id))?;

        let ack = self
            .registry
            .mutate(id, |job| {
                if job.is_terminal() {
                    return CancelAck {
                        build_id: id,
                        status: job.status,
                        already_terminal: true,
                    };
                }

                if !job.cancel_requested {
                    job.cancel_requested = true;
                    job.append_log("Cancellation requested".to_string());
                }

                CancelAck {
                    build_id: id,
                    status: job.status,
                    already_terminal: false,
                }
            })
            .await
            .ok_or(BuildError::NotFound(id))?;

        if ack.already_terminal {
            tracing::debug!("Cancel of build {} ignored: already {}", id, ack.status);
        } else {
            tracing::info!("Cancellation requested for build {}", id);
            token.cancel();
        }

        Ok(ack)
    }

    async fn validate(&self, environments: &[String]) -> Result<Vec<String>> {
        if environments.is_empty() {
            return Err(BuildError::Validation(
                "At least one environment must be specified".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(environments.len());

        for raw in environments {
            let name = raw.trim();
            if name.is_empty() {
                return Err(BuildError::Validation(
                    "Environment names must not be blank".to_string(),
                ));
            }
            if !seen.insert(name.to_string()) {
                return Err(BuildError::Validation(format!(
                    "Environment '{}' is listed more than once",
                    name
                )));
            }
            names.push(name.to_string());
        }

        let mut unknown = Vec::new();
        for name in &names {
            if !self.catalog.environment_exists(name).await {
                unknown.push(name.as_str());
            }
        }

        if !unknown.is_empty() {
            return Err(BuildError::Validation(format!(
                "Unknown environment(s): {}",
                unknown.join(", ")
            )));
        }

        Ok(names)
    }
}
