use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use assetkeep_auth::{
    AccountUpdate, IdentityProvider, IssuedToken, JwtIssuer, Principal, Profile, ProfileUpdate, hash_password,
    require_self, validate_password, verify_password,
};
use assetkeep_core::{DomainError, ProfileId};

use super::{ServiceError, ServiceResult};
use crate::store::{InventoryStore, StoreError};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// A signed-in profile plus its bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub profile: Profile,
    pub token: IssuedToken,
}

/// Result of an external provider handshake, handed over by the OAuth edge.
#[derive(Debug, Clone)]
pub struct IdentityLogin {
    pub provider: IdentityProvider,
    pub external_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// Attach the identity to this already signed-in profile.
    pub link_to: Option<ProfileId>,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn InventoryStore>,
    issuer: Arc<JwtIssuer>,
}

fn email_taken(err: StoreError) -> ServiceError {
    match err {
        StoreError::Conflict(_) => DomainError::validation("User already exists").into(),
        other => other.into(),
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn InventoryStore>, issuer: Arc<JwtIssuer>) -> Self {
        Self { store, issuer }
    }

    fn session(&self, profile: Profile) -> ServiceResult<AuthSession> {
        let token = self
            .issuer
            .issue(profile.id, Utc::now())
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(AuthSession { profile, token })
    }

    async fn load(&self, id: ProfileId) -> ServiceResult<Profile> {
        self.store
            .find_profile(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, password, full_name), err)]
    pub async fn register(&self, email: &str, password: &str, full_name: Option<String>) -> ServiceResult<AuthSession> {
        let email = Profile::normalize_email(email)?;
        validate_password(password)?;
        if self.store.find_profile_by_email(&email).await?.is_some() {
            return Err(DomainError::validation("User already exists").into());
        }

        // argon2 is CPU-bound; keep it off the async workers.
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let profile = Profile::create(&email, Some(hash), full_name, Utc::now())?;
        self.store.insert_profile(&profile).await.map_err(email_taken)?;
        tracing::info!(profile_id = %profile.id, "account registered");
        self.session(profile)
    }

    #[instrument(skip(self, password), err)]
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthSession> {
        let email = email.trim().to_lowercase();
        let profile = self
            .store
            .find_profile_by_email(&email)
            .await?
            .ok_or_else(|| DomainError::unauthorized(INVALID_CREDENTIALS))?;

        let Some(hash) = profile.password_hash.clone() else {
            return Err(DomainError::unauthorized(
                "This account uses social login. Please sign in with the linked provider",
            )
            .into());
        };

        let password = password.to_string();
        let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        if !ok {
            return Err(DomainError::unauthorized(INVALID_CREDENTIALS).into());
        }
        self.session(profile)
    }

    /// Resolve a provider login to a profile: explicit link, then an existing
    /// link, then an email match (auto-linked), then a new account.
    ///
    /// This is the library seam for the OAuth edge. There is no HTTP route for
    /// it: `login` must only carry an identity the edge has verified with the
    /// provider, so it is called in-process by that edge and never with
    /// client-supplied fields.
    #[instrument(skip(self, login), fields(provider = login.provider.as_str()), err)]
    pub async fn login_with_identity(&self, login: IdentityLogin) -> ServiceResult<AuthSession> {
        let now = Utc::now();

        if let Some(target) = login.link_to {
            let mut profile = self.load(target).await?;
            profile.link_identity(login.provider, &login.external_id, now)?;
            self.store.update_profile(&profile).await.map_err(|e| match e {
                StoreError::Conflict(_) => {
                    ServiceError::from(DomainError::validation("This account is already linked to another user"))
                }
                other => other.into(),
            })?;
            tracing::info!(profile_id = %profile.id, provider = login.provider.as_str(), "identity linked");
            return self.session(profile);
        }

        if let Some(profile) = self
            .store
            .find_profile_by_identity(login.provider, &login.external_id)
            .await?
        {
            return self.session(profile);
        }

        let email = login
            .email
            .as_deref()
            .ok_or_else(|| DomainError::validation("Provider did not return an email address"))?;
        let email = Profile::normalize_email(email)?;

        if let Some(mut profile) = self.store.find_profile_by_email(&email).await? {
            profile.link_identity(login.provider, &login.external_id, now)?;
            self.store.update_profile(&profile).await?;
            tracing::info!(profile_id = %profile.id, provider = login.provider.as_str(), "identity auto-linked by email");
            return self.session(profile);
        }

        let mut profile = Profile::create(&email, None, login.full_name, now)?;
        profile.link_identity(login.provider, &login.external_id, now)?;
        self.store.insert_profile(&profile).await.map_err(email_taken)?;
        tracing::info!(profile_id = %profile.id, provider = login.provider.as_str(), "account created from identity");
        self.session(profile)
    }

    /// Rebuild the caller from the stored row; a deleted profile no longer
    /// authenticates even with a valid token.
    pub async fn resolve_principal(&self, id: ProfileId) -> ServiceResult<Principal> {
        let profile = self
            .store
            .find_profile(id)
            .await?
            .ok_or_else(|| DomainError::unauthorized("User no longer exists"))?;
        Ok(Principal::new(profile.id, profile.is_admin))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Own account
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn me(&self, owner: ProfileId) -> ServiceResult<Profile> {
        self.load(owner).await
    }

    pub async fn update_account(&self, owner: ProfileId, update: AccountUpdate) -> ServiceResult<Profile> {
        let mut profile = self.load(owner).await?;
        if let Some(email) = update.email.as_deref() {
            let email = Profile::normalize_email(email)?;
            if let Some(existing) = self.store.find_profile_by_email(&email).await? {
                if existing.id != owner {
                    return Err(DomainError::validation("Email is already in use").into());
                }
            }
        }
        profile.apply_account_update(update, Utc::now())?;
        self.store.update_profile(&profile).await.map_err(|e| match e {
            StoreError::Conflict(_) => ServiceError::from(DomainError::validation("Email is already in use")),
            other => other.into(),
        })?;
        Ok(profile)
    }

    pub async fn upload_avatar(&self, owner: ProfileId, avatar: &str) -> ServiceResult<Profile> {
        let mut profile = self.load(owner).await?;
        profile.set_avatar(avatar, Utc::now())?;
        self.store.update_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn unlink(&self, owner: ProfileId, provider: &str) -> ServiceResult<Profile> {
        let provider: IdentityProvider = provider.parse()?;
        let mut profile = self.load(owner).await?;
        profile.unlink_identity(provider, Utc::now())?;
        self.store.update_profile(&profile).await?;
        tracing::info!(profile_id = %owner, provider = provider.as_str(), "identity unlinked");
        Ok(profile)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profiles by id (self only)
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_profile(&self, principal: &Principal, id: ProfileId) -> ServiceResult<Profile> {
        require_self(principal, id)?;
        self.load(id).await
    }

    pub async fn update_profile(
        &self,
        principal: &Principal,
        id: ProfileId,
        update: ProfileUpdate,
    ) -> ServiceResult<Profile> {
        require_self(principal, id)?;
        let mut profile = self.load(id).await?;
        profile.apply_update(update, Utc::now());
        self.store.update_profile(&profile).await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::store;
    use assetkeep_auth::{Hs256JwtValidator, JwtValidator};
    use chrono::Duration;

    const SECRET: &str = "test-secret";

    fn service(store: Arc<dyn InventoryStore>) -> AccountService {
        AccountService::new(store, Arc::new(JwtIssuer::new(SECRET, Duration::days(7))))
    }

    fn google(external_id: &str, email: Option<&str>) -> IdentityLogin {
        IdentityLogin {
            provider: IdentityProvider::Google,
            external_id: external_id.to_string(),
            email: email.map(str::to_string),
            full_name: Some("G User".into()),
            link_to: None,
        }
    }

    fn is_bad_request<T: std::fmt::Debug>(r: ServiceResult<T>) -> bool {
        matches!(r, Err(ServiceError::Domain(DomainError::BadRequest(_))))
    }

    fn is_unauthorized<T: std::fmt::Debug>(r: ServiceResult<T>) -> bool {
        matches!(r, Err(ServiceError::Domain(DomainError::Unauthorized(_))))
    }

    #[tokio::test]
    async fn register_then_login_issues_valid_tokens() {
        let accounts = service(store());
        let session = accounts.register("Ann@Example.com", "secret1", Some("Ann".into())).await.unwrap();
        assert_eq!(session.profile.email, "ann@example.com");

        let claims = Hs256JwtValidator::new(SECRET).validate(&session.token.token, Utc::now()).unwrap();
        assert_eq!(claims.sub, session.profile.id);

        let again = accounts.login("ann@example.com", "secret1").await.unwrap();
        assert_eq!(again.profile.id, session.profile.id);
    }

    #[tokio::test]
    async fn registration_rules() {
        let accounts = service(store());
        assert!(is_bad_request(accounts.register("not-an-email", "secret1", None).await));
        assert!(is_bad_request(accounts.register("a@example.com", "short", None).await));
        accounts.register("a@example.com", "secret1", None).await.unwrap();
        assert!(is_bad_request(accounts.register("A@example.com", "secret1", None).await));
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let accounts = service(store());
        accounts.register("a@example.com", "secret1", None).await.unwrap();
        assert!(is_unauthorized(accounts.login("a@example.com", "wrong-pass").await));
        assert!(is_unauthorized(accounts.login("nobody@example.com", "secret1").await));
    }

    #[tokio::test]
    async fn provider_only_accounts_cannot_use_password_login() {
        let accounts = service(store());
        accounts.login_with_identity(google("g-1", Some("g@example.com"))).await.unwrap();
        assert!(is_unauthorized(accounts.login("g@example.com", "anything").await));
    }

    #[tokio::test]
    async fn identity_resolution_order() {
        let accounts = service(store());
        let existing = accounts.register("a@example.com", "secret1", None).await.unwrap().profile;

        // Email match auto-links.
        let linked = accounts.login_with_identity(google("g-1", Some("a@example.com"))).await.unwrap();
        assert_eq!(linked.profile.id, existing.id);
        assert!(linked.profile.identity(IdentityProvider::Google).is_some());

        // Existing link wins even when the provider reports another email.
        let again = accounts.login_with_identity(google("g-1", Some("other@example.com"))).await.unwrap();
        assert_eq!(again.profile.id, existing.id);

        // Unknown identity with fresh email creates a password-less account.
        let created = accounts.login_with_identity(google("g-2", Some("new@example.com"))).await.unwrap();
        assert_ne!(created.profile.id, existing.id);
        assert!(!created.profile.has_password());

        // Unknown identity without email cannot create anything.
        assert!(is_bad_request(accounts.login_with_identity(google("g-3", None)).await));
    }

    #[tokio::test]
    async fn explicit_link_targets_the_signed_in_profile() {
        let accounts = service(store());
        let me = accounts.register("me@example.com", "secret1", None).await.unwrap().profile;
        let login = IdentityLogin {
            provider: IdentityProvider::Microsoft,
            external_id: "ms-7".into(),
            email: Some("someone-else@example.com".into()),
            full_name: None,
            link_to: Some(me.id),
        };
        let session = accounts.login_with_identity(login).await.unwrap();
        assert_eq!(session.profile.id, me.id);
        assert!(session.profile.identity(IdentityProvider::Microsoft).is_some());
    }

    #[tokio::test]
    async fn last_sign_in_method_cannot_be_unlinked() {
        let accounts = service(store());
        let profile = accounts.login_with_identity(google("g-1", Some("g@example.com"))).await.unwrap().profile;
        assert!(is_bad_request(accounts.unlink(profile.id, "google").await));
        assert!(is_bad_request(accounts.unlink(profile.id, "myspace").await));
    }

    #[tokio::test]
    async fn email_change_cannot_collide() {
        let accounts = service(store());
        accounts.register("a@example.com", "secret1", None).await.unwrap();
        let b = accounts.register("b@example.com", "secret1", None).await.unwrap().profile;
        let update = AccountUpdate {
            full_name: None,
            email: Some("A@example.com".into()),
        };
        assert!(is_bad_request(accounts.update_account(b.id, update).await));
    }

    #[tokio::test]
    async fn profiles_are_self_only_and_deleted_profiles_stop_resolving() {
        let store = store();
        let accounts = service(store.clone());
        let a = accounts.register("a@example.com", "secret1", None).await.unwrap().profile;
        let b = accounts.register("b@example.com", "secret1", None).await.unwrap().profile;

        let caller = accounts.resolve_principal(a.id).await.unwrap();
        assert!(!caller.is_admin);
        assert!(accounts.get_profile(&caller, a.id).await.is_ok());
        assert!(matches!(
            accounts.get_profile(&caller, b.id).await,
            Err(ServiceError::Domain(DomainError::Forbidden(_)))
        ));

        store.delete_profile(a.id).await.unwrap();
        assert!(is_unauthorized(accounts.resolve_principal(a.id).await));
    }
}
