use assetkeep_auth::Principal;
use assetkeep_core::ProfileId;

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware; present for every protected route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn profile_id(&self) -> ProfileId {
        self.principal.profile_id
    }
}
