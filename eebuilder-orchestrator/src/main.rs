use anyhow::Context;
use eebuilder_orchestrator::api;
use eebuilder_orchestrator::config::Config;
use eebuilder_orchestrator::repository::{FsEnvironmentCatalog, JobRegistry};
use eebuilder_orchestrator::runner::BuilderProcessRunner;
use eebuilder_orchestrator::service::Orchestrator;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eebuilder_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EE Builder Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!("Environments directory: {}", config.environments_dir.display());
    tracing::info!("Build command: {}", config.builder_command.join(" "));
    tracing::info!("Execution policy: {}", config.execution_policy);
    tracing::info!(
        "Termination grace period: {}s",
        config.termination_grace_period.as_secs()
    );

    if !config.environments_dir.is_dir() {
        tracing::warn!(
            "Environments directory {} does not exist; every build request will be rejected",
            config.environments_dir.display()
        );
    }

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(JobRegistry::new()),
        Arc::new(FsEnvironmentCatalog::new(config.environments_dir.clone())),
        Arc::new(BuilderProcessRunner::from_config(&config)),
        config.execution_policy,
    ));

    // Build router with all API endpoints
    let app = api::create_router(orchestrator);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
