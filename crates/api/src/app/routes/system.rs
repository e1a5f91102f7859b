use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::Response};
use serde_json::json;

use crate::app::errors;
use crate::app::services::AppServices;

/// Liveness plus a store round-trip. A failing store answers `503`.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.store.health_check().await {
        Ok(()) => errors::ok(json!({ "status": "ok", "store": "ok" })),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            errors::json_error(StatusCode::SERVICE_UNAVAILABLE, "internal_error", "Store unavailable")
        }
    }
}

pub async fn not_found() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "Route not found")
}
