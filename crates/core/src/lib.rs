//! `assetkeep-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (identifiers, the error
//! taxonomy, money). No storage, no HTTP.

pub mod entity;
pub mod error;
pub mod id;
pub mod patch;
pub mod time;
pub mod value_object;

pub use entity::{Entity, OwnedEntity};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{CategoryId, ItemId, LendingLogId, LocationId, ProfileId};
pub use value_object::{Price, ValueObject};
