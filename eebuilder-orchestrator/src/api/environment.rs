//! Environment API Handlers

use axum::{Json, extract::State};
use eebuilder_core::dto::environment::EnvironmentList;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /api/environments
/// List environment directories and whether they can be built
pub async fn list_environments(State(state): State<AppState>) -> ApiResult<Json<EnvironmentList>> {
    tracing::debug!("Listing environments");

    let environments = state
        .orchestrator
        .catalog()
        .list_environments()
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to list environments: {}", e)))?;

    Ok(Json(EnvironmentList { environments }))
}
