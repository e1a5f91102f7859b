//! Entity trait: identity + continuity across state changes.

use crate::ProfileId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity exclusively controlled by one profile.
///
/// Every read or write of an owned entity is scoped by this owner.
pub trait OwnedEntity: Entity {
    fn owner(&self) -> ProfileId;

    fn is_owned_by(&self, profile: ProfileId) -> bool {
        self.owner() == profile
    }
}
