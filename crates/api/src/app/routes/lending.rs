use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    routing::get,
};
use serde_json::json;

use crate::app::dto::{LendingLogQuery, LendingLogView};
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_lending_logs))
}

/// Newest first, each log joined with a short item summary.
pub async fn list_lending_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<LendingLogQuery>,
) -> ApiResult {
    let filter = query.into_filter()?;
    let entries = services.lending.list(principal.profile_id(), &filter).await?;
    let logs: Vec<LendingLogView> = entries.into_iter().map(LendingLogView::from).collect();
    Ok(errors::ok(json!({ "logs": logs })))
}
