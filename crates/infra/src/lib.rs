//! Infrastructure layer: configuration, persistence, external services and
//! the application services that tie them to the domain.

pub mod config;
pub mod db;
pub mod external;
pub mod services;
pub mod store;


pub use config::{AppConfig, AppEnv, ConfigError};
pub use store::{InMemoryStore, InventoryStore, PgStore, StoreError, StoreResult};
