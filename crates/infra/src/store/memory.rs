//! In-memory store for tests/dev. Every mutation runs under one write lock.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use assetkeep_auth::{IdentityProvider, Profile};
use assetkeep_core::{CategoryId, ItemId, LendingLogId, LocationId, OwnedEntity, ProfileId};
use assetkeep_inventory::{
    Category, CategoryMatch, Item, ItemFilter, ItemStatus, LendingLog, LendingLogFilter, Location, Page,
    PageRequest,
};

use super::{InventoryStore, ProfileCounts, StoreError, StoreResult, SubtreeDeletion};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<ProfileId, Profile>,
    locations: HashMap<LocationId, Location>,
    categories: HashMap<CategoryId, Category>,
    items: HashMap<ItemId, Item>,
    logs: HashMap<LendingLogId, LendingLog>,
}

impl Tables {
    fn identity_taken(&self, profile: &Profile) -> bool {
        self.profiles.values().filter(|p| p.id != profile.id).any(|other| {
            other
                .identities
                .iter()
                .any(|i| profile.identities.contains(i))
        })
    }

    fn email_taken(&self, profile: &Profile) -> bool {
        self.profiles
            .values()
            .any(|p| p.id != profile.id && p.email == profile.email)
    }

    /// Overwrite the stored item only while its status is still `read_status`.
    fn replace_item_if(&mut self, item: &Item, read_status: ItemStatus) -> StoreResult<()> {
        match self.items.get_mut(&item.id) {
            Some(existing) if existing.is_owned_by(item.user_id) && existing.status == read_status => {
                *existing = item.clone();
                Ok(())
            }
            Some(existing) if existing.is_owned_by(item.user_id) => Err(StoreError::Conflict(format!(
                "item {} is no longer {read_status}",
                item.id
            ))),
            _ => Err(StoreError::Database(format!("item {} vanished", item.id))),
        }
    }

    fn remove_items<F>(&mut self, mut doomed: F) -> u64
    where
        F: FnMut(&Item) -> bool,
    {
        let ids: HashSet<ItemId> = self.items.values().filter(|i| doomed(i)).map(|i| i.id).collect();
        self.items.retain(|id, _| !ids.contains(id));
        self.logs.retain(|_, log| !ids.contains(&log.item_id));
        ids.len() as u64
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn newest_first<T, K: Ord>(rows: &mut [T], key: impl Fn(&T) -> K) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    // ── profiles ────────────────────────────────────────────────────────────

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.profiles.contains_key(&profile.id) || t.email_taken(profile) {
            return Err(StoreError::Conflict(format!("email {} already registered", profile.email)));
        }
        if t.identity_taken(profile) {
            return Err(StoreError::Conflict("identity already linked".to_string()));
        }
        t.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn update_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.profiles.contains_key(&profile.id) {
            return Err(StoreError::Database(format!("profile {} vanished", profile.id)));
        }
        if t.email_taken(profile) {
            return Err(StoreError::Conflict(format!("email {} already registered", profile.email)));
        }
        if t.identity_taken(profile) {
            return Err(StoreError::Conflict("identity already linked".to_string()));
        }
        t.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn find_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        Ok(self.read()?.profiles.get(&id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        Ok(self.read()?.profiles.values().find(|p| p.email == email).cloned())
    }

    async fn find_profile_by_identity(
        &self,
        provider: IdentityProvider,
        external_id: &str,
    ) -> StoreResult<Option<Profile>> {
        Ok(self
            .read()?
            .profiles
            .values()
            .find(|p| p.identity(provider).is_some_and(|i| i.external_id == external_id))
            .cloned())
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let mut all: Vec<Profile> = self.read()?.profiles.values().cloned().collect();
        newest_first(&mut all, |p| (p.created_at, p.id));
        Ok(all)
    }

    async fn delete_profile(&self, id: ProfileId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if t.profiles.remove(&id).is_none() {
            return Ok(false);
        }
        t.remove_items(|i| i.is_owned_by(id));
        t.logs.retain(|_, l| !l.is_owned_by(id));
        t.locations.retain(|_, l| !l.is_owned_by(id));
        t.categories.retain(|_, c| !c.is_owned_by(id));
        Ok(true)
    }

    async fn count_profiles(&self, now: DateTime<Utc>) -> StoreResult<ProfileCounts> {
        let t = self.read()?;
        Ok(ProfileCounts {
            total: t.profiles.len() as u64,
            pro: t.profiles.values().filter(|p| p.is_pro(now)).count() as u64,
        })
    }

    // ── locations ───────────────────────────────────────────────────────────

    async fn insert_location(&self, location: &Location) -> StoreResult<()> {
        self.write()?.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn update_location(&self, location: &Location) -> StoreResult<()> {
        let mut t = self.write()?;
        match t.locations.get_mut(&location.id) {
            Some(existing) if existing.is_owned_by(location.user_id) => {
                *existing = location.clone();
                Ok(())
            }
            _ => Err(StoreError::Database(format!("location {} vanished", location.id))),
        }
    }

    async fn find_location(&self, owner: ProfileId, id: LocationId) -> StoreResult<Option<Location>> {
        Ok(self.read()?.locations.get(&id).filter(|l| l.is_owned_by(owner)).cloned())
    }

    async fn list_locations(&self, owner: ProfileId) -> StoreResult<Vec<Location>> {
        let mut all: Vec<Location> = self
            .read()?
            .locations
            .values()
            .filter(|l| l.is_owned_by(owner))
            .cloned()
            .collect();
        all.sort_by_key(|l| (l.created_at, l.id));
        Ok(all)
    }

    async fn delete_locations(&self, owner: ProfileId, ids: &[LocationId]) -> StoreResult<SubtreeDeletion> {
        let mut t = self.write()?;
        let doomed: HashSet<LocationId> = ids
            .iter()
            .copied()
            .filter(|id| t.locations.get(id).is_some_and(|l| l.is_owned_by(owner)))
            .collect();
        let items = t.remove_items(|i| i.is_owned_by(owner) && i.location_id.is_some_and(|l| doomed.contains(&l)));
        t.locations.retain(|id, _| !doomed.contains(id));
        Ok(SubtreeDeletion {
            locations: doomed.len() as u64,
            items,
        })
    }

    // ── categories ──────────────────────────────────────────────────────────

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        self.write()?.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> StoreResult<()> {
        let mut t = self.write()?;
        match t.categories.get_mut(&category.id) {
            Some(existing) if existing.is_owned_by(category.user_id) => {
                *existing = category.clone();
                Ok(())
            }
            _ => Err(StoreError::Database(format!("category {} vanished", category.id))),
        }
    }

    async fn find_category(&self, owner: ProfileId, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.read()?.categories.get(&id).filter(|c| c.is_owned_by(owner)).cloned())
    }

    async fn list_categories(&self, owner: ProfileId) -> StoreResult<Vec<Category>> {
        let mut all: Vec<Category> = self
            .read()?
            .categories
            .values()
            .filter(|c| c.is_owned_by(owner))
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn delete_category(&self, owner: ProfileId, id: CategoryId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if !t.categories.get(&id).is_some_and(|c| c.is_owned_by(owner)) {
            return Ok(false);
        }
        t.categories.remove(&id);
        for item in t.items.values_mut().filter(|i| i.category_id == Some(id)) {
            item.category_id = None;
        }
        Ok(true)
    }

    // ── items ───────────────────────────────────────────────────────────────

    async fn insert_item(&self, item: &Item) -> StoreResult<()> {
        self.write()?.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn find_item(&self, owner: ProfileId, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.read()?.items.get(&id).filter(|i| i.is_owned_by(owner)).cloned())
    }

    async fn find_items(&self, owner: ProfileId, ids: &[ItemId]) -> StoreResult<Vec<Item>> {
        let t = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| t.items.get(id))
            .filter(|i| i.is_owned_by(owner))
            .cloned()
            .collect())
    }

    async fn list_items(&self, owner: ProfileId, filter: &ItemFilter, page: PageRequest) -> StoreResult<Page<Item>> {
        let mut matching: Vec<Item> = self
            .read()?
            .items
            .values()
            .filter(|i| i.is_owned_by(owner) && filter.matches(i))
            .cloned()
            .collect();
        newest_first(&mut matching, |i| (i.created_at, i.id));
        Ok(Page::slice(matching, page))
    }

    async fn all_items(&self, owner: ProfileId) -> StoreResult<Vec<Item>> {
        let mut all: Vec<Item> = self
            .read()?
            .items
            .values()
            .filter(|i| i.is_owned_by(owner))
            .cloned()
            .collect();
        newest_first(&mut all, |i| (i.created_at, i.id));
        Ok(all)
    }

    async fn update_item(
        &self,
        item: &Item,
        read_status: ItemStatus,
        close_open_log_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        t.replace_item_if(item, read_status)?;
        if let Some(at) = close_open_log_at {
            for log in t.logs.values_mut().filter(|l| l.item_id == item.id) {
                log.close(at);
            }
        }
        Ok(())
    }

    async fn lend_item(&self, item: &Item, log: &LendingLog) -> StoreResult<()> {
        let mut t = self.write()?;
        let stored_available = t
            .items
            .get(&item.id)
            .is_some_and(|i| i.is_owned_by(item.user_id) && !i.is_lent());
        let open_exists = t.logs.values().any(|l| l.item_id == item.id && l.is_open());
        if !stored_available || open_exists {
            return Err(StoreError::Conflict(format!("item {} is already lent", item.id)));
        }
        t.items.insert(item.id, item.clone());
        t.logs.insert(log.id, log.clone());
        Ok(())
    }

    async fn return_item(&self, item: &Item, returned_at: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.write()?;
        t.replace_item_if(item, ItemStatus::Lent)?;
        let open = LendingLog::most_recent_open(t.logs.values(), item.id).map(|l| l.id);
        if let Some(log) = open.and_then(|id| t.logs.get_mut(&id)) {
            log.close(returned_at);
        }
        Ok(())
    }

    async fn delete_item(&self, owner: ProfileId, id: ItemId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.remove_items(|i| i.id == id && i.is_owned_by(owner)) > 0)
    }

    async fn retag_items(
        &self,
        owner: ProfileId,
        selector: &CategoryMatch,
        new_tag: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut t = self.write()?;
        let mut changed = 0;
        for item in t
            .items
            .values_mut()
            .filter(|i| i.is_owned_by(owner) && selector.matches(i.category.as_deref()))
        {
            item.category = new_tag.map(str::to_string);
            item.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    // ── lending logs ────────────────────────────────────────────────────────

    async fn list_lending_logs(
        &self,
        owner: ProfileId,
        filter: &LendingLogFilter,
        limit: Option<u32>,
    ) -> StoreResult<Vec<LendingLog>> {
        let mut logs: Vec<LendingLog> = self
            .read()?
            .logs
            .values()
            .filter(|l| l.is_owned_by(owner) && filter.matches(l))
            .cloned()
            .collect();
        newest_first(&mut logs, |l| (l.created_at, l.id));
        if let Some(limit) = limit {
            logs.truncate(limit as usize);
        }
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetkeep_inventory::{LendRequest, NewItem, NewLocation};
    use chrono::Duration;

    fn item(owner: ProfileId, name: &str, at: DateTime<Utc>) -> Item {
        Item::create(owner, NewItem { name: name.into(), ..Default::default() }, at).unwrap()
    }

    #[tokio::test]
    async fn reads_are_owner_scoped() {
        let store = InMemoryStore::new();
        let (alice, bob) = (ProfileId::new(), ProfileId::new());
        let now = Utc::now();
        let drill = item(alice, "Drill", now);
        store.insert_item(&drill).await.unwrap();

        assert!(store.find_item(alice, drill.id).await.unwrap().is_some());
        assert!(store.find_item(bob, drill.id).await.unwrap().is_none());
        assert!(store.all_items(bob).await.unwrap().is_empty());
        assert!(!store.delete_item(bob, drill.id).await.unwrap());
    }

    #[tokio::test]
    async fn second_lend_conflicts() {
        let store = InMemoryStore::new();
        let owner = ProfileId::new();
        let now = Utc::now();
        let original = item(owner, "Ladder", now);
        store.insert_item(&original).await.unwrap();

        let mut first = original.clone();
        let log = first
            .lend(LendRequest { borrower: "Sam".into(), ..Default::default() }, now)
            .unwrap();
        store.lend_item(&first, &log).await.unwrap();

        // a racing request that read the item before the first lend committed
        let mut second = original.clone();
        let log2 = second
            .lend(LendRequest { borrower: "Kim".into(), ..Default::default() }, now)
            .unwrap();
        assert!(matches!(store.lend_item(&second, &log2).await, Err(StoreError::Conflict(_))));

        let logs = store.list_lending_logs(owner, &LendingLogFilter::default(), None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].borrower, "Sam");
    }

    #[tokio::test]
    async fn items_list_newest_first() {
        let store = InMemoryStore::new();
        let owner = ProfileId::new();
        let now = Utc::now();
        for (n, name) in ["a", "b", "c"].iter().enumerate() {
            store.insert_item(&item(owner, name, now + Duration::seconds(n as i64))).await.unwrap();
        }
        let page = store
            .list_items(owner, &ItemFilter::default(), PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        let names: Vec<_> = page.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["c", "b"]);
    }

    #[tokio::test]
    async fn deleting_locations_takes_their_items_and_logs() {
        let store = InMemoryStore::new();
        let owner = ProfileId::new();
        let now = Utc::now();
        let shed = Location::create(owner, NewLocation { name: "Shed".into(), parent_id: None }, now).unwrap();
        store.insert_location(&shed).await.unwrap();

        let mut mower = item(owner, "Mower", now);
        mower.location_id = Some(shed.id);
        store.insert_item(&mower).await.unwrap();
        let mut lent = mower.clone();
        let log = lent.lend(LendRequest { borrower: "Neighbour".into(), ..Default::default() }, now).unwrap();
        store.lend_item(&lent, &log).await.unwrap();
        let elsewhere = item(owner, "Kettle", now);
        store.insert_item(&elsewhere).await.unwrap();

        let gone = store.delete_locations(owner, &[shed.id]).await.unwrap();
        assert_eq!(gone, SubtreeDeletion { locations: 1, items: 1 });
        assert!(store.find_item(owner, mower.id).await.unwrap().is_none());
        assert!(store.find_item(owner, elsewhere.id).await.unwrap().is_some());
        assert!(store.list_lending_logs(owner, &LendingLogFilter::default(), None).await.unwrap().is_empty());
    }
}
