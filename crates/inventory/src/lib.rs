//! Inventory domain module.
//!
//! Business rules for locations, items, lending and categories, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage). Every
//! function that depends on the clock takes `now` explicitly.

pub mod category;
pub mod item;
pub mod lending;
pub mod location;
pub mod query;
pub mod stats;

pub use category::{Category, CategoryMatch, CategoryPatch, NewCategory, UNCATEGORIZED};
pub use item::{Item, ItemPatch, ItemStatus, LendRequest, LoanEffect, NewItem, is_overdue};
pub use lending::{LendingLog, LendingLogFilter};
pub use location::{Location, LocationPatch, LocationTree, NewLocation, subtree_item_count};
pub use query::{ItemFilter, Page, PageRequest};
pub use stats::{AdminStats, DashboardStats, StatusBreakdown};
