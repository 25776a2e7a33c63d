//! Environment command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use eebuilder_client::BuilderClient;

use crate::config::Config;

/// Environment subcommands
#[derive(Subcommand)]
pub enum EnvCommands {
    /// List environments the orchestrator can see
    List,
}

pub async fn handle_env_command(command: EnvCommands, config: &Config) -> Result<()> {
    let client = BuilderClient::new(&config.orchestrator_url);

    match command {
        EnvCommands::List => list_environments(&client).await,
    }
}

async fn list_environments(client: &BuilderClient) -> Result<()> {
    let environments = client.list_environments().await?;

    if environments.is_empty() {
        println!("{}", "No environments found.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} environment(s):", environments.len()).bold()
    );
    println!();
    for env in environments {
        let marker = if env.has_execution_environment {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {}", marker, env.name.cyan());
        println!("    Path: {}", env.path.dimmed());
        if !env.has_execution_environment {
            println!("    {}", "missing execution-environment.yml".yellow());
        }
    }

    Ok(())
}
