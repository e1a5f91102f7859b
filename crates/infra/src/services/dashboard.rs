use std::sync::Arc;

use chrono::Utc;

use assetkeep_core::ProfileId;
use assetkeep_inventory::DashboardStats;

use super::ServiceResult;
use crate::store::InventoryStore;

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn InventoryStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Derived on every read; nothing here is persisted.
    pub async fn stats(&self, owner: ProfileId) -> ServiceResult<DashboardStats> {
        let items = self.store.all_items(owner).await?;
        Ok(DashboardStats::compute(&items, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ItemService;
    use crate::services::test_support::{account, store};
    use assetkeep_core::Price;
    use assetkeep_inventory::{ItemPatch, ItemStatus, NewItem};

    #[tokio::test]
    async fn totals_follow_item_state() {
        let store = store();
        let owner = account(&store, "a@example.com").await;
        let items = ItemService::new(store.clone());
        let dashboard = DashboardService::new(store);

        let priced = |name: &str, cents: i64| NewItem {
            name: name.into(),
            price: Some(Price::from_cents(cents).unwrap()),
            ..Default::default()
        };
        items.create(owner, priced("TV", 50_000)).await.unwrap();
        let phone = items.create(owner, priced("Phone", 30_000)).await.unwrap();
        items.create(owner, NewItem { name: "Mug".into(), ..Default::default() }).await.unwrap();

        let lost = ItemPatch { status: Some(ItemStatus::Lost), ..Default::default() };
        items.update(owner, phone.id, lost).await.unwrap();

        let stats = dashboard.stats(owner).await.unwrap();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.total_value.cents(), 80_000);
        assert_eq!(stats.financial_loss.cents(), 30_000);
        assert_eq!(stats.current_value.cents(), 50_000);
        assert_eq!(stats.status_breakdown.get(ItemStatus::Lost), 1);
        assert_eq!(stats.overdue_count, 0);
    }
}
