use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::json;

use assetkeep_core::{DomainError, ItemId};
use assetkeep_inventory::{ItemPatch, LendRequest, NewItem};

use crate::app::dto::{self, ItemDetailView, ItemListView, ItemView, LendingLogView};
use crate::app::errors::{self, ApiResult, json_body, parse_id};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        // Batch routes are literal paths and take precedence over `/:id`.
        .route("/batch/category", put(batch_update_category))
        .route("/batch/clear-category", put(batch_clear_category))
        .route("/", get(list_items).post(create_item))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/lend", post(lend_item))
        .route("/:id/return", post(return_item))
        .route("/:id/lending-logs", get(item_lending_logs))
}

// ─────────────────────────────────────────────────────────────────────────────
// CRUD
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ItemListQuery>,
) -> ApiResult {
    let (filter, page) = query.into_filter()?;
    let items = services.items.list(principal.profile_id(), &filter, page).await?;
    Ok(errors::ok(ItemListView::new(items, Utc::now())))
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ItemId = parse_id(&id)?;
    let detail = services.items.get(principal.profile_id(), id).await?;
    Ok(errors::ok(json!({ "item": ItemDetailView::new(detail, Utc::now()) })))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewItem>, JsonRejection>,
) -> ApiResult {
    let fields = json_body(body)?;
    let item = services.items.create(principal.profile_id(), fields).await?;
    Ok(errors::created(
        "Item created successfully",
        json!({ "item": ItemView::new(item, Utc::now()) }),
    ))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ItemPatch>, JsonRejection>,
) -> ApiResult {
    let id: ItemId = parse_id(&id)?;
    let patch = json_body(body)?;
    let item = services.items.update(principal.profile_id(), id, patch).await?;
    Ok(errors::ok_with_message(
        "Item updated successfully",
        json!({ "item": ItemView::new(item, Utc::now()) }),
    ))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ItemId = parse_id(&id)?;
    services.items.delete(principal.profile_id(), id).await?;
    Ok(errors::message("Item deleted successfully"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Lending
// ─────────────────────────────────────────────────────────────────────────────

pub async fn lend_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<LendRequest>, JsonRejection>,
) -> ApiResult {
    let id: ItemId = parse_id(&id)?;
    let request = json_body(body)?;
    let item = services.items.lend(principal.profile_id(), id, request).await?;
    Ok(errors::ok_with_message(
        "Item lent successfully",
        json!({ "item": ItemView::new(item, Utc::now()) }),
    ))
}

pub async fn return_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ItemId = parse_id(&id)?;
    let item = services.items.return_item(principal.profile_id(), id).await?;
    Ok(errors::ok_with_message(
        "Item returned successfully",
        json!({ "item": ItemView::new(item, Utc::now()) }),
    ))
}

pub async fn item_lending_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ItemId = parse_id(&id)?;
    let entries = services.lending.list_for_item(principal.profile_id(), id).await?;
    let logs: Vec<LendingLogView> = entries.into_iter().map(LendingLogView::from).collect();
    Ok(errors::ok(json!({ "logs": logs })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Free-text category tag
// ─────────────────────────────────────────────────────────────────────────────

pub async fn batch_update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::BatchCategoryRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;
    let new = body
        .new_category_name
        .ok_or_else(|| DomainError::validation("New category name is required"))?;
    let updated = services
        .items
        .recategorize(principal.profile_id(), body.old_category_name.as_deref(), &new)
        .await?;
    Ok(errors::ok_with_message("Items updated successfully", json!({ "updated": updated })))
}

pub async fn batch_clear_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::ClearCategoryRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;
    let name = body
        .category_name
        .ok_or_else(|| DomainError::validation("Category name is required"))?;
    let updated = services.items.clear_category(principal.profile_id(), &name).await?;
    Ok(errors::ok_with_message(
        "Items uncategorized successfully",
        json!({ "updated": updated }),
    ))
}
