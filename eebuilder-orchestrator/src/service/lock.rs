//! Image cache locks
//!
//! The build tool writes into the container runtime's local image store, so
//! two builds against the same runtime must not overlap. Under `per-job` each
//! environment takes the lock of its runtime. Under `global` a job takes one
//! lock shared by every runtime for the whole batch.

use eebuilder_core::domain::build::ContainerRuntime;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// How long a job keeps the image cache lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Lock around each environment's build; jobs interleave between environments
    #[default]
    PerJob,
    /// One lock for the whole job regardless of runtime; batches run one after another
    Global,
}

impl ExecutionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPolicy::PerJob => "per-job",
            ExecutionPolicy::Global => "global",
        }
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per-job" | "per_job" | "perjob" => Ok(ExecutionPolicy::PerJob),
            "global" => Ok(ExecutionPolicy::Global),
            other => Err(format!(
                "Unknown execution policy '{}' (expected 'per-job' or 'global')",
                other
            )),
        }
    }
}

/// Shared set of image cache locks
#[derive(Clone, Default)]
pub struct ExecutionLocks {
    policy: ExecutionPolicy,
    podman: Arc<Mutex<()>>,
    docker: Arc<Mutex<()>>,
    global: Arc<Mutex<()>>,
}

impl ExecutionLocks {
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Lock taken once before the first environment
    ///
    /// `Ok(None)` means the policy does not lock at job level.
    /// `Err(Cancelled)` means the token fired while waiting.
    pub async fn acquire_for_job(
        &self,
        runtime: ContainerRuntime,
        cancel: &CancellationToken,
    ) -> Result<Option<OwnedMutexGuard<()>>, Cancelled> {
        match self.policy {
            ExecutionPolicy::PerJob => Ok(None),
            ExecutionPolicy::Global => {
                let guard = acquire(&self.global, cancel).await?;
                tracing::debug!("Acquired global build lock for {} job", runtime);
                Ok(Some(guard))
            }
        }
    }

    /// Lock taken around a single environment's build
    pub async fn acquire_for_environment(
        &self,
        runtime: ContainerRuntime,
        cancel: &CancellationToken,
    ) -> Result<Option<OwnedMutexGuard<()>>, Cancelled> {
        match self.policy {
            ExecutionPolicy::PerJob => {
                let lock = match runtime {
                    ContainerRuntime::Podman => &self.podman,
                    ContainerRuntime::Docker => &self.docker,
                };
                let guard = acquire(lock, cancel).await?;
                tracing::debug!("Acquired {} image cache lock", runtime);
                Ok(Some(guard))
            }
            ExecutionPolicy::Global => Ok(None),
        }
    }
}

/// Waits for `lock` unless `cancel` fires first
async fn acquire(
    lock: &Arc<Mutex<()>>,
    cancel: &CancellationToken,
) -> Result<OwnedMutexGuard<()>, Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        guard = Arc::clone(lock).lock_owned() => Ok(guard),
    }
}

/// The cancellation token fired while waiting for a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("per-job".parse::<ExecutionPolicy>(), Ok(ExecutionPolicy::PerJob));
        assert_eq!(" GLOBAL ".parse::<ExecutionPolicy>(), Ok(ExecutionPolicy::Global));
        assert!("sometimes".parse::<ExecutionPolicy>().is_err());
        assert_eq!(ExecutionPolicy::default().to_string(), "per-job");
    }

    #[tokio::test]
    async fn test_per_job_locks_only_environments() {
        let locks = ExecutionLocks::new(ExecutionPolicy::PerJob);
        let cancel = CancellationToken::new();

        let job = locks.acquire_for_job(ContainerRuntime::Podman, &cancel).await;
        assert!(matches!(job, Ok(None)));

        let env = locks
            .acquire_for_environment(ContainerRuntime::Podman, &cancel)
            .await;
        assert!(matches!(env, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_runtimes_do_not_contend() {
        let locks = ExecutionLocks::new(ExecutionPolicy::PerJob);
        let cancel = CancellationToken::new();

        let _podman = locks
            .acquire_for_environment(ContainerRuntime::Podman, &cancel)
            .await
            .unwrap();

        let docker = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire_for_environment(ContainerRuntime::Docker, &cancel),
        )
        .await;
        assert!(matches!(docker, Ok(Ok(Some(_)))));
    }

    #[tokio::test]
    async fn test_global_lock_spans_runtimes() {
        let locks = ExecutionLocks::new(ExecutionPolicy::Global);
        let cancel = CancellationToken::new();

        let _podman = locks
            .acquire_for_job(ContainerRuntime::Podman, &cancel)
            .await
            .unwrap();

        let docker = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire_for_job(ContainerRuntime::Docker, &cancel),
        )
        .await;
        assert!(docker.is_err());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let locks = ExecutionLocks::new(ExecutionPolicy::Global);
        let held = locks
            .acquire_for_job(ContainerRuntime::Podman, &CancellationToken::new())
            .await
            .unwrap();
        assert!(held.is_some());

        let cancel = CancellationToken::new();
        let waiter = {
            let locks = locks.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                locks
                    .acquire_for_job(ContainerRuntime::Podman, &cancel)
                    .await
                    .map(|guard| guard.is_some())
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), Err(Cancelled));
    }
}
