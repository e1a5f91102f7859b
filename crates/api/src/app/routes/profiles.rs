use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    routing::get,
};
use chrono::Utc;
use serde_json::json;

use assetkeep_auth::ProfileUpdate;
use assetkeep_core::ProfileId;

use crate::app::dto::ProfileView;
use crate::app::errors::{self, ApiResult, json_body, parse_id};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/:id", get(get_profile).put(update_profile))
}

pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ProfileId = parse_id(&id)?;
    let profile = services.accounts.get_profile(principal.principal(), id).await?;
    Ok(errors::ok(json!({ "profile": ProfileView::from_profile(&profile, Utc::now()) })))
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult {
    let id: ProfileId = parse_id(&id)?;
    let update = json_body(body)?;
    let profile = services
        .accounts
        .update_profile(principal.principal(), id, update)
        .await?;
    Ok(errors::ok_with_message(
        "Profile updated successfully",
        json!({ "profile": ProfileView::from_profile(&profile, Utc::now()) }),
    ))
}
