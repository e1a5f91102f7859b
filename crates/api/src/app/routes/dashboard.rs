use std::sync::Arc;

use axum::{Router, extract::Extension, routing::get};

use crate::app::dto::DashboardStatsView;
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/stats", get(stats))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let stats = services.dashboard.stats(principal.profile_id()).await?;
    Ok(errors::ok(DashboardStatsView::from(stats)))
}
