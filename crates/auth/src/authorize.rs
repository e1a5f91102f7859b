use thiserror::Error;

use assetkeep_core::{DomainError, ProfileId};

use crate::{Principal, Profile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Admin access required")]
    AdminRequired,

    #[error("You can only access your own profile")]
    NotSelf,

    #[error("Cannot delete an admin account")]
    ProtectedAdmin,
}

impl From<AuthzError> for DomainError {
    fn from(err: AuthzError) -> Self {
        DomainError::forbidden(err.to_string())
    }
}

/// Admin capability check. Fails closed.
///
/// - No IO
/// - No panics
pub fn require_admin(principal: &Principal) -> Result<(), AuthzError> {
    if principal.is_admin {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}

pub fn require_self(principal: &Principal, target: ProfileId) -> Result<(), AuthzError> {
    if principal.profile_id == target {
        Ok(())
    } else {
        Err(AuthzError::NotSelf)
    }
}

/// Admins may delete accounts, but never another admin's (or their own).
pub fn ensure_deletable(principal: &Principal, target: &Profile) -> Result<(), AuthzError> {
    require_admin(principal)?;
    if target.is_admin {
        return Err(AuthzError::ProtectedAdmin);
    }
    Ok(())
}
