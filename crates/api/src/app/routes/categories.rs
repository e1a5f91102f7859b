use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    routing::get,
};
use serde_json::json;

use assetkeep_core::CategoryId;
use assetkeep_inventory::{CategoryPatch, NewCategory};

use crate::app::errors::{self, ApiResult, json_body, parse_id};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let categories = services.categories.list(principal.profile_id()).await?;
    Ok(errors::ok(json!({ "categories": categories })))
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: CategoryId = parse_id(&id)?;
    let category = services.categories.get(principal.profile_id(), id).await?;
    Ok(errors::ok(json!({ "category": category })))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> ApiResult {
    let fields = json_body(body)?;
    let category = services.categories.create(principal.profile_id(), fields).await?;
    Ok(errors::created("Category created successfully", json!({ "category": category })))
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<CategoryPatch>, JsonRejection>,
) -> ApiResult {
    let id: CategoryId = parse_id(&id)?;
    let patch = json_body(body)?;
    let category = services.categories.update(principal.profile_id(), id, patch).await?;
    Ok(errors::ok_with_message("Category updated successfully", json!({ "category": category })))
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: CategoryId = parse_id(&id)?;
    services.categories.delete(principal.profile_id(), id).await?;
    Ok(errors::message("Category deleted successfully"))
}
