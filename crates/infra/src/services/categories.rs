use std::sync::Arc;

use chrono::Utc;

use assetkeep_core::{CategoryId, ProfileId};
use assetkeep_inventory::{Category, CategoryPatch, NewCategory};

use super::{ServiceError, ServiceResult};
use crate::store::InventoryStore;

/// Owned category entities (`Item::category_id`). The free-text tag on items
/// is managed through the item batch operations instead.
#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn InventoryStore>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner: ProfileId, fields: NewCategory) -> ServiceResult<Category> {
        let category = Category::create(owner, fields, Utc::now())?;
        self.store.insert_category(&category).await?;
        Ok(category)
    }

    pub async fn list(&self, owner: ProfileId) -> ServiceResult<Vec<Category>> {
        Ok(self.store.list_categories(owner).await?)
    }

    pub async fn get(&self, owner: ProfileId, id: CategoryId) -> ServiceResult<Category> {
        self.store
            .find_category(owner, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category"))
    }

    pub async fn update(&self, owner: ProfileId, id: CategoryId, patch: CategoryPatch) -> ServiceResult<Category> {
        let mut category = self.get(owner, id).await?;
        category.apply_patch(patch)?;
        self.store.update_category(&category).await?;
        Ok(category)
    }

    pub async fn delete(&self, owner: ProfileId, id: CategoryId) -> ServiceResult<()> {
        if !self.store.delete_category(owner, id).await? {
            return Err(ServiceError::not_found("Category"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ItemService;
    use crate::services::test_support::{account, store};
    use assetkeep_inventory::NewItem;

    #[tokio::test]
    async fn deleting_a_category_unlinks_its_items() {
        let store = store();
        let owner = account(&store, "a@example.com").await;
        let categories = CategoryService::new(store.clone());
        let items = ItemService::new(store.clone());

        let tools = categories
            .create(owner, NewCategory { name: "Tools".into(), icon: Some("wrench".into()) })
            .await
            .unwrap();
        let saw = items
            .create(owner, NewItem { name: "Saw".into(), category_id: Some(tools.id), ..Default::default() })
            .await
            .unwrap();

        categories.delete(owner, tools.id).await.unwrap();
        let saw = store.find_item(owner, saw.id).await.unwrap().unwrap();
        assert!(saw.category_id.is_none());
        assert!(categories.get(owner, tools.id).await.is_err());
    }

    #[tokio::test]
    async fn list_is_sorted_and_scoped() {
        let store = store();
        let alice = account(&store, "alice@example.com").await;
        let bob = account(&store, "bob@example.com").await;
        let categories = CategoryService::new(store);

        for name in ["Tools", "Books", "Garden"] {
            categories
                .create(alice, NewCategory { name: name.into(), icon: None })
                .await
                .unwrap();
        }
        let names: Vec<_> = categories.list(alice).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["Books", "Garden", "Tools"]);
        assert!(categories.list(bob).await.unwrap().is_empty());

        let books = categories.list(alice).await.unwrap().remove(0);
        let patch = CategoryPatch { name: Some("Novels".into()), icon: None };
        assert!(categories.update(bob, books.id, patch.clone()).await.is_err());
        assert_eq!(categories.update(alice, books.id, patch).await.unwrap().name, "Novels");
    }
}
