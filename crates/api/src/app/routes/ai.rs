use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    routing::post,
};

use crate::app::dto::AnalyzeRequest;
use crate::app::errors::{self, ApiResult, json_body};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/analyze", post(analyze))
}

/// Suggest item fields from a photo. Collaborator trouble yields the
/// placeholder suggestion, never an error.
pub async fn analyze(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;
    let image = body.image.unwrap_or_default();
    let analysis = services.analysis.analyze(&image).await?;
    Ok(errors::ok(analysis))
}
