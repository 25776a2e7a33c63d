//! ansible-builder process runner
//!
//! Spawns the build tool inside the environment's directory:
//!
//! ```text
//! <command...> build --file <definition> --tag <env> --container-runtime <runtime> <args...>
//! ```
//!
//! stdout and stderr are read concurrently and appended to the build log in
//! arrival order. Once the tool has exited, output still held open by
//! leftover descendants is drained for at most [`OUTPUT_DRAIN_TIMEOUT`].

use async_trait::async_trait;
use eebuilder_core::domain::build::ContainerRuntime;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ProcessRunner, RunOutcome, SPAWN_FAILURE_EXIT_CODE, WAIT_FAILURE_EXIT_CODE};
use crate::config::Config;
use crate::repository::environment::{DEFINITION_FILES, find_definition};
use crate::service::log::LogSink;

/// How long output is still collected after the build tool exited
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runner that invokes `ansible-builder` (or a compatible command)
pub struct BuilderProcessRunner {
    /// Program followed by any leading arguments
    command: Vec<String>,
    /// Extra arguments appended after the build arguments
    extra_args: Vec<String>,
    environments_dir: PathBuf,
    grace_period: Duration,
}

impl BuilderProcessRunner {
    /// Creates a runner
    ///
    /// # Arguments
    /// * `command` - Program and leading arguments (e.g. `["ansible-builder"]`)
    /// * `environments_dir` - Directory holding one sub-directory per environment
    pub fn new(command: Vec<String>, environments_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            extra_args: Vec::new(),
            environments_dir: environments_dir.into(),
            grace_period: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.builder_command.clone(), config.environments_dir.clone())
            .with_extra_args(config.builder_args.clone())
            .with_grace_period(config.termination_grace_period)
    }

    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("ansible-builder")
    }

    fn build_command(
        &self,
        environment: &str,
        definition: &str,
        runtime: ContainerRuntime,
    ) -> Command {
        let mut command = Command::new(self.program());
        command
            .args(self.command.iter().skip(1))
            .arg("build")
            .arg("--file")
            .arg(definition)
            .arg("--tag")
            .arg(environment)
            .arg("--container-runtime")
            .arg(runtime.as_str())
            .args(&self.extra_args)
            .current_dir(self.environments_dir.join(environment))
            .env("CONTAINER_RUNTIME", runtime.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so signals reach the container tooling it spawns.
        #[cfg(unix)]
        command.process_group(0);

        command
    }

    /// Asks the child to stop, then waits out the grace period
    async fn terminate(&self, child: &mut Child, environment: &str) -> std::io::Result<ExitStatus> {
        send_terminate(child, environment);
        self.reap(child, Instant::now() + self.grace_period, environment)
            .await
    }

    /// Waits for the child until `deadline`, force-killing it afterwards
    async fn reap(
        &self,
        child: &mut Child,
        deadline: Instant,
        environment: &str,
    ) -> std::io::Result<ExitStatus> {
        match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                force_kill(child, environment);
                child.wait().await
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for BuilderProcessRunner {
    async fn execute(
        &self,
        environment: &str,
        runtime: ContainerRuntime,
        sink: &LogSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        info!(
            "Building environment {} with {} (build {})",
            environment,
            runtime,
            sink.build_id()
        );

        // A missing directory falls through to a spawn failure below.
        let definition = find_definition(&self.environments_dir.join(environment))
            .await
            .unwrap_or(DEFINITION_FILES[0]);

        let mut child = match self.build_command(environment, definition, runtime).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    "Failed to start build tool '{}' for {}: {}",
                    self.program(),
                    environment,
                    e
                );
                sink.append(format!(
                    "Failed to start build tool '{}': {}",
                    self.program(),
                    e
                ))
                .await;
                return RunOutcome::exited(SPAWN_FAILURE_EXIT_CODE);
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut interrupted = false;
        let mut kill_deadline: Option<Instant> = None;
        let mut exited: Option<std::io::Result<ExitStatus>> = None;
        let mut drain_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => {
                        sink.append(line).await;
                    }
                    None => break,
                },
                status = child.wait(), if exited.is_none() => {
                    exited = Some(status);
                    drain_deadline = Some(Instant::now() + OUTPUT_DRAIN_TIMEOUT);
                }
                _ = cancel.cancelled(), if !interrupted && exited.is_none() => {
                    interrupted = true;
                    kill_deadline = Some(Instant::now() + self.grace_period);
                    send_terminate(&mut child, environment);
                }
                _ = tokio::time::sleep_until(kill_deadline.unwrap_or_else(Instant::now)), if kill_deadline.is_some() && exited.is_none() => {
                    kill_deadline = None;
                    force_kill(&mut child, environment);
                }
                _ = tokio::time::sleep_until(drain_deadline.unwrap_or_else(Instant::now)), if drain_deadline.is_some() => {
                    debug!(
                        "Output of {} still open {:?} after exit, detaching",
                        environment, OUTPUT_DRAIN_TIMEOUT
                    );
                    break;
                }
            }
        }

        // Output closed before the exit was observed; wait, still honouring cancellation.
        let status = match exited {
            Some(status) => status,
            None if interrupted => {
                let deadline = kill_deadline.unwrap_or_else(Instant::now);
                self.reap(&mut child, deadline, environment).await
            }
            None => {
                let status = tokio::select! {
                    status = child.wait() => Some(status),
                    _ = cancel.cancelled() => None,
                };
                match status {
                    Some(status) => status,
                    None => {
                        interrupted = true;
                        self.terminate(&mut child, environment).await
                    }
                }
            }
        };

        let exit_code = match status {
            Ok(status) => exit_code(status),
            Err(e) => {
                warn!("Failed to wait for build of {}: {}", environment, e);
                sink.append(format!("Failed to wait for build tool: {}", e))
                    .await;
                WAIT_FAILURE_EXIT_CODE
            }
        };

        debug!(
            "Build tool for {} finished with exit code {} (interrupted: {})",
            environment, exit_code, interrupted
        );

        if interrupted {
            RunOutcome::interrupted(exit_code)
        } else {
            RunOutcome::exited(exit_code)
        }
    }
}

/// Reads `reader` line by line into `tx`, replacing invalid UTF-8
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Stopped reading build output: {}", e);
                break;
            }
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child, environment: &str) {
    debug!("Sending SIGTERM to build of {}", environment);
    signal_group(child, libc::SIGTERM, environment);
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, environment: &str) {
    force_kill(child, environment);
}

#[cfg(unix)]
fn force_kill(child: &mut Child, environment: &str) {
    warn!("Force-killing build of {}", environment);
    if !signal_group(child, libc::SIGKILL, environment) {
        if let Err(e) = child.start_kill() {
            debug!("Kill of build of {} failed: {}", environment, e);
        }
    }
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child, environment: &str) {
    warn!("Force-killing build of {}", environment);
    if let Err(e) = child.start_kill() {
        debug!("Kill of build of {} failed: {}", environment, e);
    }
}

/// Signals the child's whole process group. Returns `false` if nothing was signalled.
#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int, environment: &str) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };

    // Safety: plain syscall; the group id equals the pid of a child we have not reaped.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if rc != 0 {
        warn!(
            "Failed to signal build of {} (pid {}): {}",
            environment,
            pid,
            std::io::Error::last_os_error()
        );
        return false;
    }
    true
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(WAIT_FAILURE_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(WAIT_FAILURE_EXIT_CODE)
}
