//! EE Builder CLI
//!
//! Command-line interface for the EE Builder orchestrator.

mod commands;
mod config;
mod id_resolver;

use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "eebuilder", version)]
#[command(about = "Build Ansible execution environment images", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli { config, command } = Cli::parse();
    handle_command(command, &config).await
}
