//! Location hierarchy.
//!
//! Locations form a forest per owner through a nullable parent pointer. The
//! tree is never trusted to be acyclic when walked: every traversal keeps a
//! visited set.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assetkeep_core::patch::nullable;
use assetkeep_core::{DomainError, DomainResult, Entity, LocationId, OwnedEntity, ProfileId};

use crate::item::Item;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub user_id: ProfileId,
    pub name: String,
    pub parent_id: Option<LocationId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewLocation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<LocationId>,
}

/// Rename and/or re-parent. `parent_id: null` moves the location to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocationPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<LocationId>>,
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Location name is required"));
    }
    Ok(name.to_string())
}

impl Location {
    /// Parent ownership is verified by the caller against the store.
    pub fn create(owner: ProfileId, fields: NewLocation, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: LocationId::new(),
            user_id: owner,
            name: validate_name(&fields.name)?,
            parent_id: fields.parent_id,
            created_at: now,
        })
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        self.name = validate_name(name)?;
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl OwnedEntity for Location {
    fn owner(&self) -> ProfileId {
        self.user_id
    }
}

/// Parent → children index over one owner's locations.
#[derive(Debug, Clone, Default)]
pub struct LocationTree {
    children: HashMap<LocationId, Vec<LocationId>>,
    known: HashSet<LocationId>,
}

impl LocationTree {
    pub fn build<'a, I>(locations: I) -> Self
    where
        I: IntoIterator<Item = &'a Location>,
    {
        let mut tree = Self::default();
        for loc in locations {
            tree.known.insert(loc.id);
            if let Some(parent) = loc.parent_id {
                tree.children.entry(parent).or_default().push(loc.id);
            }
        }
        tree
    }

    pub fn contains(&self, id: LocationId) -> bool {
        self.known.contains(&id)
    }

    pub fn children_of(&self, id: LocationId) -> &[LocationId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The descendant set of `root`: `root` itself plus everything reachable
    /// through child pointers. Terminates on cyclic input.
    pub fn descendants(&self, root: LocationId) -> HashSet<LocationId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            queue.extend(self.children_of(id).iter().copied());
        }
        seen
    }

    /// Check that `id` may be re-parented under `new_parent`.
    ///
    /// Self-parenting and moving a location under one of its own descendants
    /// are both `Forbidden`.
    pub fn ensure_can_move(&self, id: LocationId, new_parent: Option<LocationId>) -> DomainResult<()> {
        let Some(parent) = new_parent else {
            return Ok(());
        };
        if parent == id {
            return Err(DomainError::forbidden("Location cannot be its own parent"));
        }
        if self.descendants(id).contains(&parent) {
            return Err(DomainError::forbidden(
                "Location cannot be moved under one of its own sub-locations",
            ));
        }
        Ok(())
    }
}

/// Count `owner`'s items located at `root` or anywhere below it.
pub fn subtree_item_count(
    owner: ProfileId,
    root: LocationId,
    locations: &[Location],
    items: &[Item],
) -> usize {
    let tree = LocationTree::build(locations.iter().filter(|l| l.is_owned_by(owner)));
    if !tree.contains(root) {
        return 0;
    }
    let subtree = tree.descendants(root);
    items
        .iter()
        .filter(|i| i.is_owned_by(owner))
        .filter(|i| i.location_id.is_some_and(|loc| subtree.contains(&loc)))
        .count()
}
