//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod build;
pub mod environment;
pub mod error;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::service::Orchestrator;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Create the main API router with all endpoints
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/", get(health::root))
        // Environment endpoints
        .route("/api/environments", get(environment::list_environments))
        // Build endpoints
        .route("/api/builds", post(build::start_build))
        .route("/api/builds", get(build::list_builds))
        .route("/api/builds/{id}", get(build::get_build))
        .route("/api/builds/{id}/cancel", post(build::cancel_build))
        // Add state and middleware
        .with_state(AppState { orchestrator })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
