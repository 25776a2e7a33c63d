//! Health Check API Handlers
//!
//! Liveness probe and service banner.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::{Value, json};

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// GET /
/// Service name and version
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "EE Builder API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
