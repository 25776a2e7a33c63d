//! Build Execution
//!
//! Drives one build through its environments. Each environment is built
//! sequentially through the [`ProcessRunner`]; its outcome is classified and,
//! when it is the last one, the build is finalised in the same registry
//! mutation. That mutation checks the cancel flag first, so a build ends up
//! `cancelled` exactly when a cancel was acknowledged before every
//! environment was classified.

use eebuilder_core::domain::build::{BuildJob, BuildStatus};
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::repository::JobRegistry;
use crate::runner::{ProcessRunner, RunOutcome};
use crate::service::lock::ExecutionLocks;
use crate::service::log::LogSink;

/// Return code recorded when the execution task itself faulted
pub const INTERNAL_ERROR_RETURN_CODE: i32 = -1;

/// Runs builds in the background
pub struct BuildExecutor {
    registry: Arc<JobRegistry>,
    runner: Arc<dyn ProcessRunner>,
    locks: ExecutionLocks,
}

/// What the loop does after an environment was classified
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

impl BuildExecutor {
    pub fn new(
        registry: Arc<JobRegistry>,
        runner: Arc<dyn ProcessRunner>,
        locks: ExecutionLocks,
    ) -> Self {
        Self {
            registry,
            runner,
            locks,
        }
    }

    /// Starts executing `job` on a background task
    ///
    /// The returned handle resolves once the build is terminal. A panic in
    /// the build task is caught and recorded as a failed build.
    pub fn spawn(self: &Arc<Self>, job: BuildJob, cancel: CancellationToken) -> JoinHandle<()> {
        let build_id = job.build_id;
        let executor = Arc::clone(self);
        let task = tokio::spawn(async move { executor.run(job, cancel).await });

        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            match task.await {
                Ok(()) => {}
                Err(err) if err.is_panic() => {
                    let reason = panic_message(err.into_panic());
                    tracing::error!("Build {} task panicked: {}", build_id, reason);
                    record_fault(&registry, build_id, &reason).await;
                }
                Err(err) => {
                    tracing::error!("Build {} task aborted: {}", build_id, err);
                    record_fault(&registry, build_id, "execution task was aborted").await;
                }
            }
        })
    }

    async fn run(&self, job: BuildJob, cancel: CancellationToken) {
        let build_id = job.build_id;
        let runtime = job.container_runtime;
        let total = job.environments.len();
        let sink = LogSink::new(Arc::clone(&self.registry), build_id);

        tracing::info!(
            "Build {} started: {} environment(s) with {}",
            build_id,
            total,
            runtime
        );
        sink.append(format!(
            "Starting build of {} environment(s) using {}",
            total, runtime
        ))
        .await;

        let _job_lock = match self.locks.acquire_for_job(runtime, &cancel).await {
            Ok(guard) => guard,
            Err(_) => {
                self.conclude(build_id, None).await;
                return;
            }
        };

        let mut last_failure = None;

        for (index, environment) in job.environments.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let _env_lock = match self.locks.acquire_for_environment(runtime, &cancel).await {
                Ok(guard) => guard,
                Err(_) => break,
            };

            // The cancel may have landed while the lock was being handed over.
            if cancel.is_cancelled() {
                break;
            }

            sink.append(format!(
                "Building environment {}/{}: {}",
                index + 1,
                total,
                environment
            ))
            .await;

            let outcome = self
                .runner
                .execute(
                    environment,
                    runtime,
                    &sink.for_environment(environment),
                    &cancel,
                )
                .await;

            tracing::debug!(
                "Build {} environment {} finished with {:?}",
                build_id,
                environment,
                outcome
            );

            let step = self
                .registry
                .mutate(build_id, |record| {
                    classify(record, environment, outcome, &mut last_failure)
                })
                .await
                .unwrap_or(Step::Stop);

            if step == Step::Stop {
                return;
            }
        }

        self.conclude(build_id, last_failure).await;
    }

    /// Finalises a build that left the loop without classifying everything
    async fn conclude(&self, build_id: Uuid, last_failure: Option<i32>) {
        self.registry
            .mutate(build_id, |record| {
                if record.is_terminal() {
                    return;
                }
                if record.cancel_requested {
                    mark_cancelled(record);
                } else {
                    finalise(record, last_failure);
                }
            })
            .await;
    }
}

/// Records one environment's outcome and finalises the build if it was the last
fn classify(
    record: &mut BuildJob,
    environment: &str,
    outcome: RunOutcome,
    last_failure: &mut Option<i32>,
) -> Step {
    if record.is_terminal() {
        return Step::Stop;
    }

    if record.cancel_requested {
        record.append_log(format!(
            "Environment {} not recorded: cancellation requested",
            environment
        ));
        mark_cancelled(record);
        return Step::Stop;
    }

    if !record.record_outcome(environment, outcome.exit_code) {
        tracing::warn!(
            "Build {} ignored duplicate outcome for {}",
            record.build_id,
            environment
        );
        return Step::Continue;
    }

    if outcome.exit_code == 0 {
        record.append_log(format!("Environment {} built successfully", environment));
    } else {
        *last_failure = Some(outcome.exit_code);
        record.append_log(format!(
            "Environment {} failed with exit code {}",
            environment, outcome.exit_code
        ));
    }

    if record.classified_count() == record.environments.len() {
        finalise(record, *last_failure);
        return Step::Stop;
    }

    Step::Continue
}

fn finalise(record: &mut BuildJob, last_failure: Option<i32>) {
    if record.failed_builds.is_empty() {
        record.append_log(format!(
            "Build completed: {} environment(s) built successfully",
            record.successful_builds.len()
        ));
        record.finish(BuildStatus::Completed, Some(0));
        tracing::info!("Build {} completed", record.build_id);
    } else {
        record.append_log(format!(
            "Build failed: {} of {} environment(s) failed",
            record.failed_builds.len(),
            record.environments.len()
        ));
        let code = last_failure.unwrap_or(1);
        record.finish(BuildStatus::Failed, Some(code));
        tracing::info!("Build {} failed with return code {}", record.build_id, code);
    }
}

fn mark_cancelled(record: &mut BuildJob) {
    record.append_log(format!(
        "Build cancelled after {} of {} environment(s)",
        record.classified_count(),
        record.environments.len()
    ));
    record.finish(BuildStatus::Cancelled, None);
    tracing::info!("Build {} cancelled", record.build_id);
}

async fn record_fault(registry: &JobRegistry, build_id: Uuid, reason: &str) {
    registry
        .mutate(build_id, |record| {
            record.append_log(format!("Internal error while building: {}", reason));
            record.finish(BuildStatus::Failed, Some(INTERNAL_ERROR_RETURN_CODE));
        })
        .await;
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::{Script, ScriptedRunner, wait_for_start, wait_for_terminal};
    use crate::service::lock::ExecutionPolicy;
    use eebuilder_core::domain::build::ContainerRuntime;
    use eebuilder_core::dto::build::BuildRequest;
    use tokio::sync::Notify;

    async fn start(
        runner: Arc<ScriptedRunner>,
        policy: ExecutionPolicy,
        envs: &[&str],
    ) -> (Arc<JobRegistry>, Arc<BuildExecutor>, Uuid) {
        let registry = Arc::new(JobRegistry::new());
        let executor = Arc::new(BuildExecutor::new(
            Arc::clone(&registry),
            runner,
            ExecutionLocks::new(policy),
        ));
        let id = launch(&registry, &executor, envs).await;
        (registry, executor, id)
    }

    async fn launch(registry: &Arc<JobRegistry>, executor: &Arc<BuildExecutor>, envs: &[&str]) -> Uuid {
        launch_request(registry, executor, BuildRequest::new(envs.iter().copied())).await
    }

    async fn launch_request(
        registry: &Arc<JobRegistry>,
        executor: &Arc<BuildExecutor>,
        request: BuildRequest,
    ) -> Uuid {
        let job = registry.create(&request).await.unwrap();
        let cancel = registry.cancel_token(job.build_id).await.unwrap();
        let id = job.build_id;
        executor.spawn(job, cancel);
        id
    }

    #[tokio::test]
    async fn test_all_environments_succeed() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .script("env-a", Script::exit(0).with_lines(&["STEP 1/2", "STEP 2/2"]))
                .script("env-b", Script::exit(0)),
        );
        let (registry, _, id) = start(runner.clone(), ExecutionPolicy::PerJob, &["env-a", "env-b"]).await;

        let job = wait_for_terminal(&registry, id).await;
        assert_eq!(job.status, BuildStatus::Completed);
        assert_eq!(job.return_code, Some(0));
        assert_eq!(job.successful_builds, vec!["env-a", "env-b"]);
        assert!(job.failed_builds.is_empty());
        assert!(job.end_time.is_some());
        assert_eq!(runner.started(), vec!["env-a", "env-b"]);

        assert!(job.logs.contains(&"[env-a] STEP 1/2".to_string()));
        let first = job.logs.iter().position(|l| l == "Building environment 1/2: env-a");
        let second = job.logs.iter().position(|l| l == "Building environment 2/2: env-b");
        assert!(first.unwrap() < second.unwrap());
    }

    #[tokio::test]
    async fn test_last_failure_sets_return_code() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .script("env-a", Script::exit(2))
                .script("env-b", Script::exit(0))
                .script("env-c", Script::exit(5)),
        );
        let (registry, _, id) =
            start(runner, ExecutionPolicy::PerJob, &["env-a", "env-b", "env-c"]).await;

        let job = wait_for_terminal(&registry, id).await;
        assert_eq!(job.status, BuildStatus::Failed);
        assert_eq!(job.return_code, Some(5));
        assert_eq!(job.successful_builds, vec!["env-b"]);
        assert_eq!(job.failed_builds, vec!["env-a", "env-c"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_environments() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .script("env-a", Script::exit(127))
                .script("env-b", Script::exit(0)),
        );
        let (registry, _, id) = start(runner.clone(), ExecutionPolicy::PerJob, &["env-a", "env-b"]).await;

        let job = wait_for_terminal(&registry, id).await;
        assert_eq!(runner.started(), vec!["env-a", "env-b"]);
        assert_eq!(job.return_code, Some(127));
        assert_eq!(job.successful_builds, vec!["env-b"]);
    }

    #[tokio::test]
    async fn test_cancel_mid_environment_leaves_it_unclassified() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .script("env-a", Script::exit(0))
                .script("env-b", Script::hang())
                .script("env-c", Script::exit(0)),
        );
        let (registry, _, id) =
            start(runner.clone(), ExecutionPolicy::PerJob, &["env-a", "env-b", "env-c"]).await;

        wait_for_start(&runner, "env-b").await;
        registry.mutate(id, |job| job.cancel_requested = true).await;
        registry.cancel_token(id).await.unwrap().cancel();

        let job = wait_for_terminal(&registry, id).await;
        assert_eq!(job.status, BuildStatus::Cancelled);
        assert_eq!(job.return_code, None);
        assert_eq!(job.successful_builds, vec!["env-a"]);
        assert!(job.failed_builds.is_empty());
        assert_eq!(runner.started(), vec!["env-a", "env-b"]);
    }

    #[tokio::test]
    async fn test_panic_is_recorded_as_failure() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .script("boom", Script::panic())
                .script("fine", Script::exit(0)),
        );
        let registry = Arc::new(JobRegistry::new());
        let executor = Arc::new(BuildExecutor::new(
            Arc::clone(&registry),
            runner,
            ExecutionLocks::new(ExecutionPolicy::PerJob),
        ));

        let broken = launch(&registry, &executor, &["boom"]).await;
        let healthy = launch(&registry, &executor, &["fine"]).await;

        let job = wait_for_terminal(&registry, broken).await;
        assert_eq!(job.status, BuildStatus::Failed);
        assert_eq!(job.return_code, Some(INTERNAL_ERROR_RETURN_CODE));
        assert!(
            job.logs
                .iter()
                .any(|l| l.starts_with("Internal error while building") && l.contains("exploded"))
        );

        let other = wait_for_terminal(&registry, healthy).await;
        assert_eq!(other.status, BuildStatus::Completed);
    }

    #[tokio::test]
    async fn test_global_policy_serialises_jobs_across_runtimes() {
        let gate = Arc::new(Notify::new());
        let runner = Arc::new(
            ScriptedRunner::new()
                .script("env-a", Script::gated(Arc::clone(&gate)))
                .script("env-b", Script::exit(0))
                .script("env-c", Script::exit(0)),
        );
        let (registry, executor, first) =
            start(runner.clone(), ExecutionPolicy::Global, &["env-a", "env-b"]).await;
        wait_for_start(&runner, "env-a").await;

        let second = launch_request(
            &registry,
            &executor,
            BuildRequest::new(["env-c"]).with_runtime(ContainerRuntime::Docker),
        )
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(runner.started(), vec!["env-a"]);

        gate.notify_one();

        wait_for_terminal(&registry, first).await;
        wait_for_terminal(&registry, second).await;
        assert_eq!(runner.started(), vec!["env-a", "env-b", "env-c"]);
    }

    #[tokio::test]
    async fn test_per_job_policy_lets_other_runtime_proceed() {
        let gate = Arc::new(Notify::new());
        let runner = Arc::new(
            ScriptedRunner::new()
                .script("env-a", Script::gated(Arc::clone(&gate)))
                .script("env-c", Script::exit(0)),
        );
        let (registry, executor, first) =
            start(runner.clone(), ExecutionPolicy::PerJob, &["env-a"]).await;
        wait_for_start(&runner, "env-a").await;

        let second = launch_request(
            &registry,
            &executor,
            BuildRequest::new(["env-c"]).with_runtime(ContainerRuntime::Docker),
        )
        .await;
        let job = wait_for_terminal(&registry, second).await;
        assert_eq!(job.status, BuildStatus::Completed);

        gate.notify_one();
        wait_for_terminal(&registry, first).await;
    }

    #[tokio::test]
    async fn test_cancel_during_lock_handover_never_starts_environment() {
        let runner = Arc::new(ScriptedRunner::new().script("env-a", Script::exit(0)));
        let registry = Arc::new(JobRegistry::new());
        let locks = ExecutionLocks::new(ExecutionPolicy::PerJob);
        let executor = Arc::new(BuildExecutor::new(
            Arc::clone(&registry),
            runner.clone(),
            locks.clone(),
        ));

        let held = locks
            .acquire_for_environment(ContainerRuntime::Podman, &CancellationToken::new())
            .await
            .unwrap();

        let id = launch(&registry, &executor, &["env-a"]).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        registry.mutate(id, |job| job.cancel_requested = true).await;
        drop(held);
        registry.cancel_token(id).await.unwrap().cancel();

        let job = wait_for_terminal(&registry, id).await;
        assert_eq!(job.status, BuildStatus::Cancelled);
        assert!(job.successful_builds.is_empty());
        assert!(runner.started().is_empty());
    }

    #[test]
    fn test_classify_after_cancel_flag() {
        let mut job = BuildJob::new(
            Uuid::new_v4(),
            vec!["env-a".to_string()],
            Default::default(),
        );
        job.cancel_requested = true;

        let mut last_failure = None;
        let step = classify(&mut job, "env-a", RunOutcome::exited(0), &mut last_failure);

        assert_eq!(step, Step::Stop);
        assert_eq!(job.status, BuildStatus::Cancelled);
        assert!(job.successful_builds.is_empty());
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }
}
