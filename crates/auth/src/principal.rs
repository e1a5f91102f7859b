use assetkeep_core::ProfileId;

/// A fully resolved caller for authorization decisions.
///
/// Built per request from a verified token plus the current profile row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Principal {
    pub profile_id: ProfileId,
    pub is_admin: bool,
}

impl Principal {
    pub fn new(profile_id: ProfileId, is_admin: bool) -> Self {
        Self { profile_id, is_admin }
    }
}
