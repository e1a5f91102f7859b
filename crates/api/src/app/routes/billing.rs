use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    routing::post,
};
use chrono::Utc;

use crate::app::dto::{CaptureRequest, ProfileView, UserEnvelope};
use crate::app::errors::{self, ApiResult, json_body};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/capture", post(capture))
}

pub async fn capture(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CaptureRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;
    let order_id = body.order_id.unwrap_or_default();
    let profile = services.billing.capture(principal.profile_id(), &order_id).await?;
    Ok(errors::ok_with_message(
        "Subscription activated",
        UserEnvelope {
            user: ProfileView::from_profile(&profile, Utc::now()),
        },
    ))
}
