//! Build API Handlers
//!
//! HTTP endpoints for submitting, inspecting and cancelling builds.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use eebuilder_core::domain::build::BuildJob;
use eebuilder_core::dto::build::{BuildList, BuildRequest, BuildResponse, CancelResponse};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /api/builds
/// Submit a build for one or more environments
pub async fn start_build(
    State(state): State<AppState>,
    Json(req): Json<BuildRequest>,
) -> ApiResult<(StatusCode, Json<BuildResponse>)> {
    tracing::info!("Build requested for {:?}", req.environments);

    let job = state.orchestrator.submit(req).await?;

    Ok((StatusCode::ACCEPTED, Json(BuildResponse::from(&job))))
}

/// GET /api/builds
/// List builds, most recent first
pub async fn list_builds(State(state): State<AppState>) -> Json<BuildList> {
    tracing::debug!("Listing builds");

    Json(BuildList {
        builds: state.orchestrator.list().await,
    })
}

/// GET /api/builds/{id}
/// Current state of a build, including logs so far
pub async fn get_build(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BuildJob>> {
    tracing::debug!("Getting build: {}", id);

    Ok(Json(state.orchestrator.status(id).await?))
}

/// POST /api/builds/{id}/cancel
/// Request cancellation of a running build
pub async fn cancel_build(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    tracing::info!("Cancelling build: {}", id);

    let ack = state.orchestrator.cancel(id).await?;
    let message = if ack.already_terminal {
        format!("Build already {}", ack.status)
    } else {
        "Cancellation requested".to_string()
    };

    Ok(Json(CancelResponse {
        build_id: ack.build_id,
        status: ack.status,
        message,
    }))
}
