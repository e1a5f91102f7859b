use std::sync::Arc;

use chrono::Utc;

use assetkeep_auth::{Principal, Profile, SubscriptionToggle, ensure_deletable, require_admin};
use assetkeep_core::ProfileId;
use assetkeep_inventory::AdminStats;

use super::{ServiceError, ServiceResult};
use crate::store::InventoryStore;

/// Cross-owner operations. Every method checks the admin flag first.
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn InventoryStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub async fn stats(&self, principal: &Principal) -> ServiceResult<AdminStats> {
        require_admin(principal)?;
        let counts = self.store.count_profiles(Utc::now()).await?;
        Ok(AdminStats::estimate(counts.total, counts.pro))
    }

    pub async fn list_users(&self, principal: &Principal) -> ServiceResult<Vec<Profile>> {
        require_admin(principal)?;
        Ok(self.store.list_profiles().await?)
    }

    pub async fn delete_user(&self, principal: &Principal, id: ProfileId) -> ServiceResult<()> {
        require_admin(principal)?;
        let target = self
            .store
            .find_profile(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        ensure_deletable(principal, &target)?;
        self.store.delete_profile(id).await?;
        tracing::info!(admin = %principal.profile_id, deleted = %id, "user deleted");
        Ok(())
    }

    pub async fn set_subscription(
        &self,
        principal: &Principal,
        id: ProfileId,
        toggle: SubscriptionToggle,
    ) -> ServiceResult<Profile> {
        require_admin(principal)?;
        let mut profile = self
            .store
            .find_profile(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        profile.toggle_subscription(toggle, Utc::now());
        self.store.update_profile(&profile).await?;
        tracing::info!(admin = %principal.profile_id, user = %id, ?toggle, "subscription toggled");
        Ok(profile)
    }
}
