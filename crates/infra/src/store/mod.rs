//! Entity store.
//!
//! One trait, two implementations: [`InMemoryStore`] for dev/tests and
//! [`PgStore`] for Postgres. Every item, location, category and lending-log
//! method is scoped by owner; there is no unscoped accessor for owned data.
//! Each mutating method is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use assetkeep_auth::{IdentityProvider, Profile};
use assetkeep_core::{CategoryId, ItemId, LocationId, ProfileId};
use assetkeep_inventory::{
    Category, CategoryMatch, Item, ItemFilter, ItemStatus, LendingLog, LendingLogFilter, Location, Page,
    PageRequest,
};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store failure. Never shown to callers verbatim.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or conditional-write constraint rejected the change.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be turned back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Map a sqlx error into a store error.
///
/// | sqlx error | code | StoreError |
/// |---|---|---|
/// | Database (unique violation) | `23505` | `Conflict` |
/// | Database (other) | any | `Database` |
/// | PoolClosed / PoolTimedOut / Io | n/a | `Unavailable` |
/// | ColumnDecode / Decode | n/a | `Corrupt` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{} in {}", err, operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{} in {}", err, operation))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ProfileCounts {
    pub total: u64,
    /// Profiles whose subscription expiry lies in the future.
    pub pro: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SubtreeDeletion {
    pub locations: u64,
    pub items: u64,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn health_check(&self) -> StoreResult<()>;

    // ── profiles ────────────────────────────────────────────────────────────

    /// Fails with `Conflict` on a duplicate email or identity link.
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()>;
    /// Rewrites the row and its identity links.
    async fn update_profile(&self, profile: &Profile) -> StoreResult<()>;
    async fn find_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>>;
    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>>;
    async fn find_profile_by_identity(
        &self,
        provider: IdentityProvider,
        external_id: &str,
    ) -> StoreResult<Option<Profile>>;
    /// Newest first.
    async fn list_profiles(&self) -> StoreResult<Vec<Profile>>;
    /// Removes the profile and everything it owns.
    async fn delete_profile(&self, id: ProfileId) -> StoreResult<bool>;
    async fn count_profiles(&self, now: DateTime<Utc>) -> StoreResult<ProfileCounts>;

    // ── locations ───────────────────────────────────────────────────────────

    async fn insert_location(&self, location: &Location) -> StoreResult<()>;
    async fn update_location(&self, location: &Location) -> StoreResult<()>;
    async fn find_location(&self, owner: ProfileId, id: LocationId) -> StoreResult<Option<Location>>;
    /// Oldest first.
    async fn list_locations(&self, owner: ProfileId) -> StoreResult<Vec<Location>>;
    /// Delete the given locations, every item placed in them and those items'
    /// lending logs, in one write.
    async fn delete_locations(&self, owner: ProfileId, ids: &[LocationId]) -> StoreResult<SubtreeDeletion>;

    // ── categories ──────────────────────────────────────────────────────────

    async fn insert_category(&self, category: &Category) -> StoreResult<()>;
    async fn update_category(&self, category: &Category) -> StoreResult<()>;
    async fn find_category(&self, owner: ProfileId, id: CategoryId) -> StoreResult<Option<Category>>;
    /// Ordered by name.
    async fn list_categories(&self, owner: ProfileId) -> StoreResult<Vec<Category>>;
    /// Items referencing the category keep their row with `category_id` cleared.
    async fn delete_category(&self, owner: ProfileId, id: CategoryId) -> StoreResult<bool>;

    // ── items ───────────────────────────────────────────────────────────────

    async fn insert_item(&self, item: &Item) -> StoreResult<()>;
    async fn find_item(&self, owner: ProfileId, id: ItemId) -> StoreResult<Option<Item>>;
    async fn find_items(&self, owner: ProfileId, ids: &[ItemId]) -> StoreResult<Vec<Item>>;
    /// Filtered page, newest first.
    async fn list_items(&self, owner: ProfileId, filter: &ItemFilter, page: PageRequest) -> StoreResult<Page<Item>>;
    async fn all_items(&self, owner: ProfileId) -> StoreResult<Vec<Item>>;
    /// Persist an edited item. With `close_open_log_at` set, the item's open
    /// lending log is closed in the same write.
    ///
    /// Fails with `Conflict` when the stored status is no longer `read_status`,
    /// so a stale copy never overwrites a lend or return that landed in between.
    async fn update_item(
        &self,
        item: &Item,
        read_status: ItemStatus,
        close_open_log_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;
    /// Persist a freshly lent item and its new log. Fails with `Conflict` if
    /// the stored item is already lent.
    async fn lend_item(&self, item: &Item, log: &LendingLog) -> StoreResult<()>;
    /// Persist a returned item and close its most recent open log. Fails with
    /// `Conflict` unless the stored item is still lent.
    async fn return_item(&self, item: &Item, returned_at: DateTime<Utc>) -> StoreResult<()>;
    async fn delete_item(&self, owner: ProfileId, id: ItemId) -> StoreResult<bool>;
    /// Set (or with `None`, clear) the free-text category of every matching
    /// item. Returns the number of items changed.
    async fn retag_items(
        &self,
        owner: ProfileId,
        selector: &CategoryMatch,
        new_tag: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    // ── lending logs ────────────────────────────────────────────────────────

    /// Newest first, at most `limit` entries when set.
    async fn list_lending_logs(
        &self,
        owner: ProfileId,
        filter: &LendingLogFilter,
        limit: Option<u32>,
    ) -> StoreResult<Vec<LendingLog>>;
}
