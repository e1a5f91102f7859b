use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    routing::get,
};
use serde_json::json;

use assetkeep_core::LocationId;
use assetkeep_inventory::{LocationPatch, NewLocation};

use crate::app::dto::{LocationListQuery, LocationView};
use crate::app::errors::{self, ApiResult, json_body, parse_id};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route(
            "/:id",
            get(get_location).put(update_location).delete(delete_location),
        )
        .route("/:id/item-count", get(item_count))
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<LocationListQuery>,
) -> ApiResult {
    let filter = query.parent_filter()?;
    let nodes = services.locations.list(principal.profile_id(), filter).await?;
    let locations: Vec<LocationView> = nodes.into_iter().map(LocationView::from).collect();
    Ok(errors::ok(json!({ "locations": locations })))
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: LocationId = parse_id(&id)?;
    let node = services.locations.get(principal.profile_id(), id).await?;
    Ok(errors::ok(json!({ "location": LocationView::from(node) })))
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewLocation>, JsonRejection>,
) -> ApiResult {
    let fields = json_body(body)?;
    let location = services.locations.create(principal.profile_id(), fields).await?;
    Ok(errors::created("Location created successfully", json!({ "location": location })))
}

pub async fn update_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<LocationPatch>, JsonRejection>,
) -> ApiResult {
    let id: LocationId = parse_id(&id)?;
    let patch = json_body(body)?;
    let location = services.locations.update(principal.profile_id(), id, patch).await?;
    Ok(errors::ok_with_message("Location updated successfully", json!({ "location": location })))
}

/// Deletes the location, its descendants, and every item stored in them.
pub async fn delete_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: LocationId = parse_id(&id)?;
    let deleted = services.locations.delete(principal.profile_id(), id).await?;
    Ok(errors::ok_with_message(
        "Location deleted successfully",
        json!({
            "deleted_locations": deleted.locations,
            "deleted_items": deleted.items,
        }),
    ))
}

pub async fn item_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: LocationId = parse_id(&id)?;
    let count = services.locations.item_count(principal.profile_id(), id).await?;
    Ok(errors::ok(json!({ "location_id": id, "count": count })))
}
