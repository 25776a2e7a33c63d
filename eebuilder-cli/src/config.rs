//! Configuration module
//!
//! Global CLI options shared by every command.

use clap::Args;
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Orchestrator URL
    #[arg(
        long = "url",
        global = true,
        env = "EEBUILDER_URL",
        default_value = "http://localhost:8000"
    )]
    pub orchestrator_url: String,
}

/// Delay between status polls when following a build
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
