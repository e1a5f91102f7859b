//! Admin routes. The admin check lives in `AdminService`; the flag comes from
//! the profile row, never from the token.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    routing::{delete, get, put},
};
use chrono::Utc;
use serde_json::json;

use assetkeep_auth::SubscriptionToggle;
use assetkeep_core::ProfileId;

use crate::app::dto::{AdminStatsView, ProfileView, SubscriptionRequest};
use crate::app::errors::{self, ApiResult, json_body, parse_id};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/subscription", put(toggle_subscription))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let stats = services.admin.stats(principal.principal()).await?;
    Ok(errors::ok(AdminStatsView::from(stats)))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let now = Utc::now();
    let users: Vec<ProfileView> = services
        .admin
        .list_users(principal.principal())
        .await?
        .iter()
        .map(|p| ProfileView::from_profile(p, now))
        .collect();
    Ok(errors::ok(json!({ "users": users })))
}

pub async fn toggle_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<SubscriptionRequest>, JsonRejection>,
) -> ApiResult {
    let id: ProfileId = parse_id(&id)?;
    let toggle = json_body(body)?.status;
    let profile = services
        .admin
        .set_subscription(principal.principal(), id, toggle)
        .await?;
    let label = match toggle {
        SubscriptionToggle::Pro => "pro",
        SubscriptionToggle::Free => "free",
    };
    Ok(errors::ok_with_message(
        format!("User subscription updated to {label}"),
        json!({ "user": ProfileView::from_profile(&profile, Utc::now()) }),
    ))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ProfileId = parse_id(&id)?;
    services.admin.delete_user(principal.principal(), id).await?;
    Ok(errors::message("User deleted successfully"))
}
