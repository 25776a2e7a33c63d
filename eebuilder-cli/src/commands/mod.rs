//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod build;
mod env;

pub use build::BuildCommands;
pub use env::EnvCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build management
    Build {
        #[command(subcommand)]
        command: BuildCommands,
    },
    /// Environment listing
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Build { command } => build::handle_build_command(command, config).await,
        Commands::Env { command } => env::handle_env_command(command, config).await,
    }
}
