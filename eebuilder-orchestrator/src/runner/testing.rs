//! Test doubles for the runner and the environment catalog

use async_trait::async_trait;
use eebuilder_core::domain::build::{BuildJob, ContainerRuntime};
use eebuilder_core::domain::environment::Environment;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ProcessRunner, RunOutcome};
use crate::repository::{EnvironmentCatalog, JobRegistry};
use crate::service::log::LogSink;

/// Polls the registry until the build is terminal
pub async fn wait_for_terminal(registry: &JobRegistry, id: Uuid) -> BuildJob {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = registry.get(id).await {
                if job.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("build did not finish in time")
}

/// Polls until `environment` has been handed to the runner
pub async fn wait_for_start(runner: &ScriptedRunner, environment: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !runner.started().iter().any(|e| e == environment) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("environment never started")
}

/// What the scripted runner does for one environment
#[derive(Clone, Default)]
pub struct Script {
    pub lines: Vec<String>,
    pub exit_code: i32,
    /// Block after emitting `lines` until cancelled
    pub hang: bool,
    /// Block after emitting `lines` until notified
    pub gate: Option<Arc<Notify>>,
    pub panic: bool,
}

impl Script {
    pub fn exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn panic() -> Self {
        Self {
            panic: true,
            ..Default::default()
        }
    }
}

/// Runner returning scripted outcomes without spawning processes
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    started: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, environment: &str, script: Script) -> Self {
        self.scripts.insert(environment.to_string(), script);
        self
    }

    /// Environments in the order they were executed
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn execute(
        &self,
        environment: &str,
        _runtime: ContainerRuntime,
        sink: &LogSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        self.started.lock().unwrap().push(environment.to_string());

        let script = self.scripts.get(environment).cloned().unwrap_or_default();

        if script.panic {
            panic!("scripted runner exploded on {}", environment);
        }

        for line in &script.lines {
            sink.append(line).await;
        }

        if script.hang {
            cancel.cancelled().await;
            return RunOutcome::interrupted(143);
        }

        if let Some(gate) = &script.gate {
            tokio::select! {
                _ = gate.notified() => {}
                _ = cancel.cancelled() => return RunOutcome::interrupted(143),
            }
        }

        RunOutcome::exited(script.exit_code)
    }
}

/// Catalog with a fixed set of environment names
pub struct StaticCatalog {
    names: HashSet<String>,
}

impl StaticCatalog {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl EnvironmentCatalog for StaticCatalog {
    async fn environment_exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    async fn list_environments(&self) -> std::io::Result<Vec<Environment>> {
        let mut names: Vec<&String> = self.names.iter().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| Environment {
                name: name.clone(),
                path: format!("/environments/{}", name),
                has_execution_environment: true,
            })
            .collect())
    }
}
