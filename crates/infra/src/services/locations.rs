use std::sync::Arc;

use chrono::Utc;

use assetkeep_core::{LocationId, ProfileId};
use assetkeep_inventory::{Location, LocationPatch, LocationTree, NewLocation, subtree_item_count};

use super::{ServiceError, ServiceResult};
use crate::store::{InventoryStore, SubtreeDeletion};

/// Which locations a listing returns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ParentFilter {
    #[default]
    Any,
    Roots,
    ChildrenOf(LocationId),
}

/// A location with its parent and direct children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationNode {
    pub location: Location,
    pub parent: Option<Location>,
    pub children: Vec<Location>,
}

fn node(location: &Location, all: &[Location]) -> LocationNode {
    LocationNode {
        location: location.clone(),
        parent: location
            .parent_id
            .and_then(|pid| all.iter().find(|l| l.id == pid))
            .cloned(),
        children: all
            .iter()
            .filter(|l| l.parent_id == Some(location.id))
            .cloned()
            .collect(),
    }
}

#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn InventoryStore>,
}

impl LocationService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    async fn require(&self, owner: ProfileId, id: LocationId) -> ServiceResult<Location> {
        self.store
            .find_location(owner, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Location"))
    }

    async fn require_parent(&self, owner: ProfileId, id: LocationId) -> ServiceResult<()> {
        self.store
            .find_location(owner, id)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Parent location"))
    }

    pub async fn create(&self, owner: ProfileId, fields: NewLocation) -> ServiceResult<Location> {
        if let Some(parent) = fields.parent_id {
            self.require_parent(owner, parent).await?;
        }
        let location = Location::create(owner, fields, Utc::now())?;
        self.store.insert_location(&location).await?;
        tracing::info!(location_id = %location.id, owner = %owner, "location created");
        Ok(location)
    }

    pub async fn list(&self, owner: ProfileId, filter: ParentFilter) -> ServiceResult<Vec<LocationNode>> {
        let all = self.store.list_locations(owner).await?;
        Ok(all
            .iter()
            .filter(|l| match filter {
                ParentFilter::Any => true,
                ParentFilter::Roots => l.is_root(),
                ParentFilter::ChildrenOf(parent) => l.parent_id == Some(parent),
            })
            .map(|l| node(l, &all))
            .collect())
    }

    pub async fn get(&self, owner: ProfileId, id: LocationId) -> ServiceResult<LocationNode> {
        let all = self.store.list_locations(owner).await?;
        all.iter()
            .find(|l| l.id == id)
            .map(|l| node(l, &all))
            .ok_or_else(|| ServiceError::not_found("Location"))
    }

    pub async fn rename(&self, owner: ProfileId, id: LocationId, name: &str) -> ServiceResult<Location> {
        self.update(owner, id, LocationPatch { name: Some(name.to_string()), parent_id: None })
            .await
    }

    pub async fn move_to(
        &self,
        owner: ProfileId,
        id: LocationId,
        new_parent: Option<LocationId>,
    ) -> ServiceResult<Location> {
        self.update(owner, id, LocationPatch { name: None, parent_id: Some(new_parent) })
            .await
    }

    /// Rename and/or re-parent in one write. Every check runs before anything
    /// is stored.
    pub async fn update(&self, owner: ProfileId, id: LocationId, patch: LocationPatch) -> ServiceResult<Location> {
        let mut location = self.require(owner, id).await?;

        if let Some(name) = patch.name.as_deref() {
            location.rename(name)?;
        }
        if let Some(new_parent) = patch.parent_id {
            if let Some(parent) = new_parent {
                if parent != id {
                    self.require_parent(owner, parent).await?;
                }
            }
            let all = self.store.list_locations(owner).await?;
            LocationTree::build(&all).ensure_can_move(id, new_parent)?;
            location.parent_id = new_parent;
        }

        self.store.update_location(&location).await?;
        Ok(location)
    }

    /// Delete the location and its whole subtree, including every item placed
    /// anywhere in it.
    pub async fn delete(&self, owner: ProfileId, id: LocationId) -> ServiceResult<SubtreeDeletion> {
        let all = self.store.list_locations(owner).await?;
        let tree = LocationTree::build(&all);
        if !tree.contains(id) {
            return Err(ServiceError::not_found("Location"));
        }
        let subtree: Vec<LocationId> = tree.descendants(id).into_iter().collect();
        let deleted = self.store.delete_locations(owner, &subtree).await?;
        tracing::info!(
            location_id = %id,
            owner = %owner,
            locations = deleted.locations,
            items = deleted.items,
            "location subtree deleted"
        );
        Ok(deleted)
    }

    /// Number of items at the location or anywhere below it.
    pub async fn item_count(&self, owner: ProfileId, id: LocationId) -> ServiceResult<usize> {
        let locations = self.store.list_locations(owner).await?;
        if !locations.iter().any(|l| l.id == id) {
            return Err(ServiceError::not_found("Location"));
        }
        let items = self.store.all_items(owner).await?;
        Ok(subtree_item_count(owner, id, &locations, &items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ItemService;
    use crate::services::test_support::{account, store};
    use assetkeep_core::{DomainError, ErrorKind};
    use assetkeep_inventory::NewItem;

    fn kind(err: ServiceError) -> ErrorKind {
        match err {
            ServiceError::Domain(e) => e.kind(),
            other => panic!("expected a domain error, got {other:?}"),
        }
    }

    fn named(name: &str, parent: Option<LocationId>) -> NewLocation {
        NewLocation { name: name.into(), parent_id: parent }
    }

    #[tokio::test]
    async fn garage_shelf_drill_scenario() {
        let store = store();
        let owner = account(&store, "a@example.com").await;
        let locations = LocationService::new(store.clone());
        let items = ItemService::new(store.clone());

        let garage = locations.create(owner, named("Garage", None)).await.unwrap();
        let shelf = locations.create(owner, named("Shelf A", Some(garage.id))).await.unwrap();
        items
            .create(owner, NewItem { name: "Drill".into(), location_id: Some(shelf.id), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(locations.item_count(owner, garage.id).await.unwrap(), 1);
        assert_eq!(locations.item_count(owner, shelf.id).await.unwrap(), 1);

        let roots = locations.list(owner, ParentFilter::Roots).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].name, "Shelf A");

        let children = locations.list(owner, ParentFilter::ChildrenOf(garage.id)).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].parent.as_ref().map(|p| p.id), Some(garage.id));
    }

    #[tokio::test]
    async fn delete_cascades_through_the_subtree_only() {
        let store = store();
        let owner = account(&store, "a@example.com").await;
        let locations = LocationService::new(store.clone());
        let items = ItemService::new(store.clone());

        let house = locations.create(owner, named("House", None)).await.unwrap();
        let attic = locations.create(owner, named("Attic", Some(house.id))).await.unwrap();
        let trunk = locations.create(owner, named("Trunk", Some(attic.id))).await.unwrap();
        let shed = locations.create(owner, named("Shed", None)).await.unwrap();

        let deep = items
            .create(owner, NewItem { name: "Photo album".into(), location_id: Some(trunk.id), ..Default::default() })
            .await
            .unwrap();
        let other = items
            .create(owner, NewItem { name: "Rake".into(), location_id: Some(shed.id), ..Default::default() })
            .await
            .unwrap();

        let deleted = locations.delete(owner, house.id).await.unwrap();
        assert_eq!(deleted, SubtreeDeletion { locations: 3, items: 1 });

        assert!(store.find_location(owner, trunk.id).await.unwrap().is_none());
        assert!(store.find_item(owner, deep.id).await.unwrap().is_none());
        assert!(store.find_item(owner, other.id).await.unwrap().is_some());
        assert_eq!(kind(locations.get(owner, attic.id).await.unwrap_err()), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn moves_reject_cycles_and_change_nothing() {
        let store = store();
        let owner = account(&store, "a@example.com").await;
        let locations = LocationService::new(store.clone());

        let a = locations.create(owner, named("A", None)).await.unwrap();
        let b = locations.create(owner, named("B", Some(a.id))).await.unwrap();

        assert_eq!(kind(locations.move_to(owner, a.id, Some(a.id)).await.unwrap_err()), ErrorKind::Forbidden);
        assert_eq!(kind(locations.move_to(owner, a.id, Some(b.id)).await.unwrap_err()), ErrorKind::Forbidden);
        assert!(store.find_location(owner, a.id).await.unwrap().unwrap().is_root());

        let moved = locations.move_to(owner, b.id, None).await.unwrap();
        assert!(moved.is_root());
    }

    #[tokio::test]
    async fn other_owners_locations_are_invisible() {
        let store = store();
        let alice = account(&store, "alice@example.com").await;
        let bob = account(&store, "bob@example.com").await;
        let locations = LocationService::new(store.clone());

        let attic = locations.create(alice, named("Attic", None)).await.unwrap();

        assert_eq!(kind(locations.get(bob, attic.id).await.unwrap_err()), ErrorKind::NotFound);
        assert_eq!(kind(locations.rename(bob, attic.id, "Mine").await.unwrap_err()), ErrorKind::NotFound);
        assert_eq!(kind(locations.delete(bob, attic.id).await.unwrap_err()), ErrorKind::NotFound);
        assert_eq!(
            kind(locations.create(bob, named("Box", Some(attic.id))).await.unwrap_err()),
            ErrorKind::NotFound
        );
        assert!(matches!(
            locations.create(alice, named("   ", None)).await,
            Err(ServiceError::Domain(DomainError::BadRequest(_)))
        ));
    }
}
