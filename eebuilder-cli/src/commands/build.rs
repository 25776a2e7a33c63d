//! Build command handlers
//!
//! Handles starting, inspecting, following and cancelling builds.

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::*;
use eebuilder_client::BuilderClient;
use eebuilder_core::domain::build::{BuildJob, BuildListItem, BuildStatus, ContainerRuntime};
use eebuilder_core::dto::build::BuildRequest;
use uuid::Uuid;

use crate::config::{Config, POLL_INTERVAL};
use crate::id_resolver::resolve_build_id;

/// Build subcommands
#[derive(Subcommand)]
pub enum BuildCommands {
    /// Start a build for one or more environments
    Start {
        /// Environment names
        #[arg(required = true)]
        environments: Vec<String>,

        /// Container runtime used by the build tool
        #[arg(long, default_value = "podman")]
        runtime: ContainerRuntime,

        /// Follow the build until it finishes
        #[arg(short, long)]
        wait: bool,
    },
    /// List builds, most recent first
    List,
    /// Show build details
    Status {
        /// Build ID or unambiguous prefix
        id: String,
    },
    /// Show build logs
    Logs {
        /// Build ID or unambiguous prefix
        id: String,

        /// Keep printing new lines until the build finishes
        #[arg(short, long)]
        follow: bool,
    },
    /// Cancel a running build
    Cancel {
        /// Build ID or unambiguous prefix
        id: String,
    },
}

/// Handle build commands
pub async fn handle_build_command(command: BuildCommands, config: &Config) -> Result<()> {
    let client = BuilderClient::new(&config.orchestrator_url);

    match command {
        BuildCommands::Start {
            environments,
            runtime,
            wait,
        } => start_build(&client, environments, runtime, wait).await,
        BuildCommands::List => list_builds(&client).await,
        BuildCommands::Status { id } => show_status(&client, &id).await,
        BuildCommands::Logs { id, follow } => show_logs(&client, &id, follow).await,
        BuildCommands::Cancel { id } => cancel_build(&client, &id).await,
    }
}

async fn start_build(
    client: &BuilderClient,
    environments: Vec<String>,
    runtime: ContainerRuntime,
    wait: bool,
) -> Result<()> {
    let req = BuildRequest::new(environments).with_runtime(runtime);
    let response = client.submit_build(&req).await?;

    println!("{} {}", "✓".green(), response.message);
    println!("  Build ID:     {}", response.build_id.to_string().cyan());
    println!("  Environments: {}", response.environments.join(", "));
    println!("  Runtime:      {}", runtime);

    if !wait {
        return Ok(());
    }

    println!();
    let job = follow_logs(client, response.build_id).await?;
    println!();
    print_outcome(&job);

    if job.status != BuildStatus::Completed {
        bail!("Build {} finished as {}", job.build_id, job.status);
    }

    Ok(())
}

async fn list_builds(client: &BuilderClient) -> Result<()> {
    let builds = client.list_builds().await?;

    if builds.is_empty() {
        println!("{}", "No builds found.".yellow());
    } else {
        println!("{}", format!("Found {} build(s):", builds.len()).bold());
        println!();
        for build in builds {
            print_build_summary(&build);
        }
    }

    Ok(())
}

async fn show_status(client: &BuilderClient, id: &str) -> Result<()> {
    let uuid = resolve_build_id(client, id).await?;
    let job = client.get_build(uuid).await?;

    print_build_details(&job);

    Ok(())
}

async fn show_logs(client: &BuilderClient, id: &str, follow: bool) -> Result<()> {
    let uuid = resolve_build_id(client, id).await?;

    if follow {
        let job = follow_logs(client, uuid).await?;
        println!();
        print_outcome(&job);
        return Ok(());
    }

    let job = client.get_build(uuid).await?;
    if job.logs.is_empty() {
        println!("{}", "No logs found for this build.".yellow());
    } else {
        println!("{}", format!("Logs for build {}:", uuid).bold());
        println!("{}", "─".repeat(80).dimmed());
        for line in &job.logs {
            print_log_line(line);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

async fn cancel_build(client: &BuilderClient, id: &str) -> Result<()> {
    let uuid = resolve_build_id(client, id).await?;
    let response = client.cancel_build(uuid).await?;

    if response.status.is_terminal() {
        println!("{} {}", "•".dimmed(), response.message);
    } else {
        println!("{} {}", "✓".green(), response.message);
        println!("  The build stops once the current environment has been terminated.");
    }

    Ok(())
}

/// Prints log lines as they arrive until the build is terminal
async fn follow_logs(client: &BuilderClient, build_id: Uuid) -> Result<BuildJob> {
    let mut skip = 0;
    loop {
        let job = client.get_build(build_id).await?;

        for line in job.logs.iter().skip(skip) {
            print_log_line(line);
        }
        skip = skip.max(job.logs.len());

        if job.status.is_terminal() {
            return Ok(job);
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn print_build_summary(build: &BuildListItem) {
    println!("  {} Build {}", "▸".cyan(), build.build_id.to_string().dimmed());
    println!("    Status:       {}", colorize_status(build.status));
    println!("    Environments: {}", build.environments.join(", "));
    println!(
        "    Started:      {}",
        build
            .start_time
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_build_details(job: &BuildJob) {
    println!("{}", "Build Details:".bold());
    println!("  ID:           {}", job.build_id.to_string().cyan());
    println!("  Status:       {}", colorize_status(job.status));
    println!("  Runtime:      {}", job.container_runtime);
    println!("  Environments: {}", job.environments.join(", "));
    println!("  Started:      {}", job.start_time.format("%Y-%m-%d %H:%M:%S"));

    if let Some(ended) = job.end_time {
        println!("  Ended:        {}", ended.format("%Y-%m-%d %H:%M:%S"));
        let duration = ended.signed_duration_since(job.start_time);
        println!("  Duration:     {}s", duration.num_seconds());
    }

    if let Some(code) = job.return_code {
        println!("  Return Code:  {}", code);
    }

    println!("\n{}", "Environments:".bold());
    for env in &job.environments {
        let marker = if job.successful_builds.contains(env) {
            "✓".green()
        } else if job.failed_builds.contains(env) {
            "✗".red()
        } else if job.status == BuildStatus::Running {
            "…".cyan()
        } else {
            "-".dimmed()
        };
        println!("  {} {}", marker, env);
    }

    println!("\n  {} log line(s); use `build logs` to view them", job.logs.len());
}

fn print_outcome(job: &BuildJob) {
    let successful = job.successful_builds.len();
    let failed = job.failed_builds.len();
    println!(
        "Build {} {}: {} succeeded, {} failed",
        job.build_id.to_string().dimmed(),
        colorize_status(job.status),
        successful.to_string().green(),
        failed.to_string().red()
    );
}

fn print_log_line(line: &str) {
    // Environment output is tagged "[env] ..."; orchestrator messages are not
    match line.split_once("] ") {
        Some((tag, rest)) if tag.starts_with('[') => {
            println!("{}] {}", tag.cyan(), rest);
        }
        _ => println!("{}", line.bold()),
    }
}

/// Colorize build status for display
fn colorize_status(status: BuildStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        BuildStatus::Running => status_str.cyan(),
        BuildStatus::Completed => status_str.green(),
        BuildStatus::Failed => status_str.red(),
        BuildStatus::Cancelled => status_str.dimmed(),
    }
}
