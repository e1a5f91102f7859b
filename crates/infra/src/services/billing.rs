use std::sync::Arc;

use chrono::Utc;

use assetkeep_auth::Profile;
use assetkeep_core::{DomainError, ProfileId};

use super::{ServiceError, ServiceResult};
use crate::external::{BillingError, CaptureOutcome, PaymentGateway};
use crate::store::InventoryStore;

#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn InventoryStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl BillingService {
    pub fn new(store: Arc<dyn InventoryStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Capture an approved order and credit one subscription period.
    ///
    /// Only a completed capture extends the window; every other outcome
    /// leaves the profile untouched.
    pub async fn capture(&self, owner: ProfileId, order_id: &str) -> ServiceResult<Profile> {
        if order_id.trim().is_empty() {
            return Err(DomainError::validation("order_id is required").into());
        }
        let mut profile = self
            .store
            .find_profile(owner)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        match self.gateway.capture_order(order_id).await {
            Ok(CaptureOutcome::Completed { capture_id }) => {
                profile.extend_subscription(Utc::now());
                self.store.update_profile(&profile).await?;
                tracing::info!(
                    profile_id = %owner,
                    capture_id = capture_id.as_deref().unwrap_or("-"),
                    "subscription extended"
                );
                Ok(profile)
            }
            Ok(CaptureOutcome::Incomplete { status }) => {
                tracing::warn!(profile_id = %owner, %status, "payment capture not completed");
                Err(DomainError::validation(format!("Payment not completed (status {status})")).into())
            }
            Err(BillingError::NotConfigured) => {
                Err(DomainError::ExternalService("Billing is not available".to_string()).into())
            }
            Err(e) => {
                tracing::warn!(profile_id = %owner, error = %e, "payment capture failed");
                Err(DomainError::ExternalService("Payment provider error".to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{account, store};
    use async_trait::async_trait;
    use chrono::Duration;

    struct Fixed(Result<CaptureOutcome, &'static str>);

    #[async_trait]
    impl PaymentGateway for Fixed {
        async fn capture_order(&self, _order_id: &str) -> Result<CaptureOutcome, BillingError> {
            self.0.clone().map_err(|e| BillingError::Transport(e.to_string()))
        }
    }

    fn service(store: Arc<dyn InventoryStore>, outcome: Result<CaptureOutcome, &'static str>) -> BillingService {
        BillingService::new(store, Arc::new(Fixed(outcome)))
    }

    #[tokio::test]
    async fn completed_capture_extends_active_window_by_thirty_days() {
        let store = store();
        let owner = account(&store, "a@example.com").await;
        let mut profile = store.find_profile(owner).await.unwrap().unwrap();
        let expiry = Utc::now() + Duration::days(5);
        profile.pro_start_date = Some(Utc::now() - Duration::days(25));
        profile.pro_expiry = Some(expiry);
        store.update_profile(&profile).await.unwrap();

        let billing = service(store.clone(), Ok(CaptureOutcome::Completed { capture_id: None }));
        let updated = billing.capture(owner, "ORDER-1").await.unwrap();
        assert_eq!(updated.pro_expiry, Some(expiry + Duration::days(30)));
    }

    #[tokio::test]
    async fn failures_grant_nothing() {
        let store = store();
        let owner = account(&store, "a@example.com").await;

        let down = service(store.clone(), Err("connection reset"));
        assert!(matches!(
            down.capture(owner, "ORDER-1").await,
            Err(ServiceError::Domain(DomainError::ExternalService(_)))
        ));

        let pending = service(store.clone(), Ok(CaptureOutcome::Incomplete { status: "PENDING".into() }));
        assert!(matches!(
            pending.capture(owner, "ORDER-1").await,
            Err(ServiceError::Domain(DomainError::BadRequest(_)))
        ));

        assert!(store.find_profile(owner).await.unwrap().unwrap().pro_expiry.is_none());
    }
}
