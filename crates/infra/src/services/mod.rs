//! Application services.
//!
//! Each service takes the caller's [`Principal`](assetkeep_auth::Principal)
//! or owner id, checks ownership against the store, runs the domain
//! transition and persists it in one store call.

use thiserror::Error;

use assetkeep_auth::AuthzError;
use assetkeep_core::DomainError;

use crate::store::StoreError;

pub mod accounts;
pub mod admin;
pub mod analysis;
pub mod billing;
pub mod categories;
pub mod dashboard;
pub mod items;
pub mod lending;
pub mod locations;

pub use accounts::{AccountService, AuthSession, IdentityLogin};
pub use admin::AdminService;
pub use analysis::AnalysisService;
pub use billing::BillingService;
pub use categories::CategoryService;
pub use dashboard::DashboardService;
pub use items::{ItemDetail, ItemService};
pub use lending::{LendingLogEntry, LendingService};
pub use locations::{LocationNode, LocationService, ParentFilter};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected failure outside the store (hashing, signing, task join).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        ServiceError::Domain(err.into())
    }
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::Domain(DomainError::not_found(format!("{what} not found")))
    }
}
