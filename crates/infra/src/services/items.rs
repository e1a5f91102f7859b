use std::sync::Arc;

use chrono::Utc;

use assetkeep_core::{CategoryId, DomainError, ItemId, LocationId, ProfileId};
use assetkeep_inventory::{
    CategoryMatch, Item, ItemFilter, ItemPatch, LendRequest, LendingLog, LendingLogFilter, LoanEffect, NewItem,
    Page, PageRequest, category::validate_new_tag,
};

use super::{ServiceError, ServiceResult};
use crate::store::{InventoryStore, StoreError};

/// How many recent lending logs come with a single item.
pub const RECENT_LOGS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetail {
    pub item: Item,
    pub lending_logs: Vec<LendingLog>,
}

#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn InventoryStore>,
}

impl ItemService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    async fn require(&self, owner: ProfileId, id: ItemId) -> ServiceResult<Item> {
        self.store
            .find_item(owner, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Item"))
    }

    /// Referenced category and location must belong to the caller.
    async fn check_refs(
        &self,
        owner: ProfileId,
        category_id: Option<CategoryId>,
        location_id: Option<LocationId>,
    ) -> ServiceResult<()> {
        if let Some(id) = category_id {
            if self.store.find_category(owner, id).await?.is_none() {
                return Err(ServiceError::not_found("Category"));
            }
        }
        if let Some(id) = location_id {
            if self.store.find_location(owner, id).await?.is_none() {
                return Err(ServiceError::not_found("Location"));
            }
        }
        Ok(())
    }

    pub async fn create(&self, owner: ProfileId, fields: NewItem) -> ServiceResult<Item> {
        self.check_refs(owner, fields.category_id, fields.location_id).await?;
        let item = Item::create(owner, fields, Utc::now())?;
        self.store.insert_item(&item).await?;
        tracing::info!(item_id = %item.id, owner = %owner, "item created");
        Ok(item)
    }

    pub async fn get(&self, owner: ProfileId, id: ItemId) -> ServiceResult<ItemDetail> {
        let item = self.require(owner, id).await?;
        let filter = LendingLogFilter { item_id: Some(id), ..Default::default() };
        let lending_logs = self.store.list_lending_logs(owner, &filter, Some(RECENT_LOGS)).await?;
        Ok(ItemDetail { item, lending_logs })
    }

    pub async fn list(&self, owner: ProfileId, filter: &ItemFilter, page: PageRequest) -> ServiceResult<Page<Item>> {
        Ok(self.store.list_items(owner, filter, page).await?)
    }

    /// Partial update. Leaving `lent` through a status edit closes the open
    /// lending log in the same write.
    pub async fn update(&self, owner: ProfileId, id: ItemId, patch: ItemPatch) -> ServiceResult<Item> {
        let mut item = self.require(owner, id).await?;
        self.check_refs(owner, patch.category_id.flatten(), patch.location_id.flatten())
            .await?;

        let read_status = item.status;
        let now = Utc::now();
        let effect = item.apply_patch(patch, now)?;
        let close_at = match effect {
            LoanEffect::Released => Some(now),
            LoanEffect::None => None,
        };
        match self.store.update_item(&item, read_status, close_at).await {
            Ok(()) => {}
            // A lend or return landed after the read.
            Err(StoreError::Conflict(_)) => {
                return Err(DomainError::validation("Item was changed by another request, reload and retry").into());
            }
            Err(e) => return Err(e.into()),
        }
        if close_at.is_some() {
            tracing::info!(item_id = %id, status = %item.status, "loan closed by status edit");
        }
        Ok(item)
    }

    pub async fn delete(&self, owner: ProfileId, id: ItemId) -> ServiceResult<()> {
        if !self.store.delete_item(owner, id).await? {
            return Err(ServiceError::not_found("Item"));
        }
        tracing::info!(item_id = %id, owner = %owner, "item deleted");
        Ok(())
    }

    pub async fn lend(&self, owner: ProfileId, id: ItemId, request: LendRequest) -> ServiceResult<Item> {
        let mut item = self.require(owner, id).await?;
        let log = item.lend(request, Utc::now())?;
        match self.store.lend_item(&item, &log).await {
            Ok(()) => {}
            // Lost a race with a concurrent lend.
            Err(StoreError::Conflict(_)) => {
                return Err(DomainError::validation("Item is already lent out").into());
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(item_id = %id, log_id = %log.id, "item lent");
        Ok(item)
    }

    pub async fn return_item(&self, owner: ProfileId, id: ItemId) -> ServiceResult<Item> {
        let mut item = self.require(owner, id).await?;
        let now = Utc::now();
        item.release(now)?;
        match self.store.return_item(&item, now).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(DomainError::validation("Item is not currently lent out").into());
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(item_id = %id, "item returned");
        Ok(item)
    }

    /// Move every item tagged `old` (or untagged, for a missing /
    /// `"Uncategorized"` old name) to the `new` tag.
    pub async fn recategorize(&self, owner: ProfileId, old: Option<&str>, new: &str) -> ServiceResult<u64> {
        let new = validate_new_tag(new)?;
        let selector = CategoryMatch::for_old_name(old);
        let changed = self.store.retag_items(owner, &selector, Some(&new), Utc::now()).await?;
        tracing::info!(owner = %owner, changed, "items recategorized");
        Ok(changed)
    }

    pub async fn clear_category(&self, owner: ProfileId, name: &str) -> ServiceResult<u64> {
        let selector = CategoryMatch::exact(name)?;
        let changed = self.store.retag_items(owner, &selector, None, Utc::now()).await?;
        tracing::info!(owner = %owner, changed, "item category cleared");
        Ok(changed)
    }
}
