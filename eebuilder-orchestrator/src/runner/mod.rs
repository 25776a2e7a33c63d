//! Build tool runner
//!
//! A [`ProcessRunner`] builds exactly one environment. Implementations stream
//! output into the build log as it is produced and report an exit code; they
//! never return errors, so a tool that cannot be started looks the same to
//! the caller as a tool that failed.

mod process;

#[cfg(test)]
pub(crate) mod testing;

pub use process::BuilderProcessRunner;

use async_trait::async_trait;
use eebuilder_core::domain::build::ContainerRuntime;
use tokio_util::sync::CancellationToken;

use crate::service::log::LogSink;

/// Exit code reported when the build tool could not be started
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Exit code reported when waiting on the build tool itself failed
pub const WAIT_FAILURE_EXIT_CODE: i32 = -1;

/// Result of one build tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: i32,
    /// The invocation was cut short by cancellation
    pub interrupted: bool,
}

impl RunOutcome {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            interrupted: false,
        }
    }

    pub fn interrupted(exit_code: i32) -> Self {
        Self {
            exit_code,
            interrupted: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.interrupted
    }
}

/// Runs the external build tool for one environment
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Builds `environment` with `runtime`, appending output lines to `sink`
    ///
    /// `sink` is already tagged with the environment name.
    ///
    /// Blocks until the tool exits. When `cancel` fires the tool is asked to
    /// terminate and, past a grace period, killed.
    async fn execute(
        &self,
        environment: &str,
        runtime: ContainerRuntime,
        sink: &LogSink,
        cancel: &CancellationToken,
    ) -> RunOutcome;
}
