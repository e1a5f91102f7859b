use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use assetkeep_core::{ItemId, ProfileId};
use assetkeep_inventory::{Item, LendingLog, LendingLogFilter};

use super::{ServiceError, ServiceResult};
use crate::store::InventoryStore;

/// A lending log joined with its item and the overdue flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingLogEntry {
    pub log: LendingLog,
    /// `None` only if the item disappeared between the two reads.
    pub item: Option<Item>,
    pub overdue: bool,
}

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn InventoryStore>,
}

impl LendingService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Lending history, newest first.
    pub async fn list(&self, owner: ProfileId, filter: &LendingLogFilter) -> ServiceResult<Vec<LendingLogEntry>> {
        let logs = self.store.list_lending_logs(owner, filter, None).await?;
        self.join_items(owner, logs).await
    }

    /// History of one item. `NotFound` unless the item is the caller's.
    pub async fn list_for_item(&self, owner: ProfileId, item_id: ItemId) -> ServiceResult<Vec<LendingLogEntry>> {
        if self.store.find_item(owner, item_id).await?.is_none() {
            return Err(ServiceError::not_found("Item"));
        }
        let filter = LendingLogFilter { item_id: Some(item_id), ..Default::default() };
        self.list(owner, &filter).await
    }

    async fn join_items(&self, owner: ProfileId, logs: Vec<LendingLog>) -> ServiceResult<Vec<LendingLogEntry>> {
        let mut ids: Vec<ItemId> = logs.iter().map(|l| l.item_id).collect();
        ids.sort();
        ids.dedup();
        let items: HashMap<ItemId, Item> = self
            .store
            .find_items(owner, &ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        let now = Utc::now();
        Ok(logs
            .into_iter()
            .map(|log| LendingLogEntry {
                overdue: log.is_overdue(now),
                item: items.get(&log.item_id).cloned(),
                log,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ItemService;
    use crate::services::test_support::{account, store};
    use assetkeep_inventory::{LendRequest, NewItem};
    use chrono::Duration;

    #[tokio::test]
    async fn entries_carry_item_and_overdue_flag() {
        let store = store();
        let owner = account(&store, "a@example.com").await;
        let items = ItemService::new(store.clone());
        let lending = LendingService::new(store.clone());

        let tent = items.create(owner, NewItem { name: "Tent".into(), ..Default::default() }).await.unwrap();
        let late = LendRequest {
            borrower: "Ari".into(),
            due_date: Some(Utc::now() - Duration::days(2)),
            ..Default::default()
        };
        items.lend(owner, tent.id, late).await.unwrap();

        let entries = lending.list(owner, &LendingLogFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].overdue);
        assert_eq!(entries[0].item.as_ref().map(|i| i.name.as_str()), Some("Tent"));

        items.return_item(owner, tent.id).await.unwrap();
        let entries = lending.list_for_item(owner, tent.id).await.unwrap();
        assert!(!entries[0].overdue);
    }

    #[tokio::test]
    async fn item_history_requires_ownership() {
        let store = store();
        let alice = account(&store, "alice@example.com").await;
        let bob = account(&store, "bob@example.com").await;
        let items = ItemService::new(store.clone());
        let lending = LendingService::new(store);

        let tent = items.create(alice, NewItem { name: "Tent".into(), ..Default::default() }).await.unwrap();
        assert!(matches!(
            lending.list_for_item(bob, tent.id).await,
            Err(ServiceError::Domain(assetkeep_core::DomainError::NotFound(_)))
        ));
        assert!(lending.list(bob, &LendingLogFilter::default()).await.unwrap().is_empty());
    }
}
