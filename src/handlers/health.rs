use axum::extract::State;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET / - service info
pub async fn root(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    })))
}

/// GET /health - liveness plus a backend ping
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!("Backend health check failed: {}", e);
        ApiError::service_unavailable("Backend unreachable")
    })?;

    Ok(ApiResponse::success(json!({
        "status": "ok",
        "backend": "ok",
        "timestamp": chrono::Utc::now(),
    }))
    .message("Healthy"))
}
