//! Profiles: account identity, linked sign-in providers and the
//! subscription window.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use assetkeep_core::patch::{non_blank, nullable};
use assetkeep_core::{DomainError, DomainResult, Entity, ProfileId};

/// Length of one paid subscription period.
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// External identities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    Google,
    Microsoft,
}

impl IdentityProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProvider::Google => "google",
            IdentityProvider::Microsoft => "microsoft",
        }
    }
}

impl core::fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(IdentityProvider::Google),
            "microsoft" => Ok(IdentityProvider::Microsoft),
            other => Err(DomainError::validation(format!("Unsupported provider '{other}'"))),
        }
    }
}

/// A provider-assigned account id linked to a profile. Unique per provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider: IdentityProvider,
    pub external_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// An account.
///
/// # Invariants
/// - `email` is stored trimmed and lower-cased.
/// - At most one identity per provider.
/// - An account always keeps at least one way to sign in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub pro_start_date: Option<DateTime<Utc>>,
    pub pro_expiry: Option<DateTime<Utc>>,
    pub identities: Vec<ExternalIdentity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Self-service edit through the profile resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: Option<Option<String>>,
}

/// Account-settings edit (name and sign-in email).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Administrative subscription switch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionToggle {
    Pro,
    Free,
}

impl Profile {
    /// Trim and lower-case an email, rejecting obviously malformed input.
    pub fn normalize_email(raw: &str) -> DomainResult<String> {
        let email = raw.trim().to_lowercase();
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
        if !valid || email.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("Please provide a valid email"));
        }
        Ok(email)
    }

    /// New account. `password_hash` is `None` for provider-only accounts.
    pub fn create(
        email: &str,
        password_hash: Option<String>,
        full_name: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: ProfileId::new(),
            email: Self::normalize_email(email)?,
            password_hash,
            full_name: non_blank(full_name),
            avatar_url: None,
            is_admin: false,
            pro_start_date: None,
            pro_expiry: None,
            identities: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    // ── subscription ────────────────────────────────────────────────────────

    pub fn is_pro(&self, now: DateTime<Utc>) -> bool {
        self.pro_expiry.is_some_and(|exp| exp > now)
    }

    /// Credit one paid period.
    ///
    /// An active window is extended from its current expiry; otherwise a new
    /// window starts at `now`.
    pub fn extend_subscription(&mut self, now: DateTime<Utc>) {
        let period = Duration::days(SUBSCRIPTION_PERIOD_DAYS);
        match self.pro_expiry {
            Some(expiry) if expiry > now => {
                self.pro_expiry = Some(expiry + period);
                if self.pro_start_date.is_none() {
                    self.pro_start_date = Some(now);
                }
            }
            _ => {
                self.pro_start_date = Some(now);
                self.pro_expiry = Some(now + period);
            }
        }
        self.updated_at = now;
    }

    /// Administrative switch: `pro` opens a fresh window, `free` clears it.
    pub fn toggle_subscription(&mut self, toggle: SubscriptionToggle, now: DateTime<Utc>) {
        match toggle {
            SubscriptionToggle::Pro => {
                self.pro_start_date = Some(now);
                self.pro_expiry = Some(now + Duration::days(SUBSCRIPTION_PERIOD_DAYS));
            }
            SubscriptionToggle::Free => {
                self.pro_start_date = None;
                self.pro_expiry = None;
            }
        }
        self.updated_at = now;
    }

    // ── identities ──────────────────────────────────────────────────────────

    pub fn identity(&self, provider: IdentityProvider) -> Option<&ExternalIdentity> {
        self.identities.iter().find(|i| i.provider == provider)
    }

    /// Link (or re-link) a provider account.
    pub fn link_identity(&mut self, provider: IdentityProvider, external_id: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(DomainError::validation("provider account id is required"));
        }
        self.identities.retain(|i| i.provider != provider);
        self.identities.push(ExternalIdentity {
            provider,
            external_id: external_id.to_string(),
        });
        self.updated_at = now;
        Ok(())
    }

    /// Remove a provider link. Refused when it is the account's only way to
    /// sign in.
    pub fn unlink_identity(&mut self, provider: IdentityProvider, now: DateTime<Utc>) -> DomainResult<()> {
        if self.identity(provider).is_none() {
            return Ok(());
        }
        if !self.has_password() && self.identities.len() == 1 {
            return Err(DomainError::validation(
                "Cannot unlink the only sign-in method; set a password or link another provider first",
            ));
        }
        self.identities.retain(|i| i.provider != provider);
        self.updated_at = now;
        Ok(())
    }

    // ── edits ───────────────────────────────────────────────────────────────

    pub fn apply_update(&mut self, update: ProfileUpdate, now: DateTime<Utc>) {
        if let Some(full_name) = update.full_name {
            self.full_name = non_blank(full_name);
        }
        if let Some(avatar) = update.avatar_url {
            self.avatar_url = non_blank(avatar);
        }
        self.updated_at = now;
    }

    /// Apply an account edit. Email uniqueness is checked by the caller.
    pub fn apply_account_update(&mut self, update: AccountUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        let email = update.email.as_deref().map(Self::normalize_email).transpose()?;
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(full_name) = update.full_name {
            self.full_name = non_blank(Some(full_name));
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn set_avatar(&mut self, avatar: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let avatar = avatar.trim();
        if avatar.is_empty() {
            return Err(DomainError::validation("No avatar provided"));
        }
        self.avatar_url = Some(avatar.to_string());
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Profile {
    type Id = ProfileId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile(now: DateTime<Utc>) -> Profile {
        Profile::create("Alice@Example.com ", Some("$argon2id$x".into()), Some("Alice".into()), now).unwrap()
    }

    #[test]
    fn email_is_normalized_and_validated() {
        let now = Utc::now();
        assert_eq!(profile(now).email, "alice@example.com");
        for bad in ["", "alice", "@example.com", "a@b", "a@.com", "a b@example.com", "a@b@c.com"] {
            assert!(Profile::normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn extend_from_active_window_adds_to_expiry() {
        let now = Utc::now();
        let mut p = profile(now);
        let expiry = now + Duration::days(10);
        p.pro_start_date = Some(now - Duration::days(20));
        p.pro_expiry = Some(expiry);

        p.extend_subscription(now);

        assert_eq!(p.pro_expiry, Some(expiry + Duration::days(30)));
        assert_eq!(p.pro_start_date, Some(now - Duration::days(20)));
    }

    #[test]
    fn extend_from_lapsed_window_starts_now() {
        let now = Utc::now();
        let mut p = profile(now);
        p.pro_expiry = Some(now - Duration::days(1));

        p.extend_subscription(now);

        assert_eq!(p.pro_start_date, Some(now));
        assert_eq!(p.pro_expiry, Some(now + Duration::days(30)));
        assert!(p.is_pro(now));
    }

    #[test]
    fn toggle_free_clears_window() {
        let now = Utc::now();
        let mut p = profile(now);
        p.toggle_subscription(SubscriptionToggle::Pro, now);
        assert!(p.is_pro(now));
        p.toggle_subscription(SubscriptionToggle::Free, now);
        assert!(!p.is_pro(now));
        assert_eq!((p.pro_start_date, p.pro_expiry), (None, None));
    }

    #[test]
    fn link_replaces_per_provider() {
        let now = Utc::now();
        let mut p = profile(now);
        p.link_identity(IdentityProvider::Google, "g-1", now).unwrap();
        p.link_identity(IdentityProvider::Google, "g-2", now).unwrap();
        assert_eq!(p.identities.len(), 1);
        assert_eq!(p.identity(IdentityProvider::Google).unwrap().external_id, "g-2");
    }

    #[test]
    fn cannot_unlink_last_sign_in_method() {
        let now = Utc::now();
        let mut p = Profile::create("oauth@example.com", None, None, now).unwrap();
        p.link_identity(IdentityProvider::Microsoft, "m-1", now).unwrap();
        assert!(p.unlink_identity(IdentityProvider::Microsoft, now).is_err());

        p.link_identity(IdentityProvider::Google, "g-1", now).unwrap();
        p.unlink_identity(IdentityProvider::Microsoft, now).unwrap();
        assert!(p.identity(IdentityProvider::Microsoft).is_none());
    }

    #[test]
    fn account_update_rejects_bad_email_without_change() {
        let now = Utc::now();
        let mut p = profile(now);
        let err = p.apply_account_update(
            AccountUpdate { full_name: Some("Renamed".into()), email: Some("nope".into()) },
            now,
        );
        assert!(err.is_err());
        assert_eq!(p.full_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn provider_parse() {
        assert_eq!("Google".parse::<IdentityProvider>().unwrap(), IdentityProvider::Google);
        assert!("github".parse::<IdentityProvider>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        /// Buying n periods back to back yields exactly n * 30 days of cover.
        #[test]
        fn consecutive_purchases_never_double_count(n in 1u32..12, gap_hours in 0i64..24) {
            let start = Utc::now();
            let mut p = profile(start);
            let mut now = start;
            for _ in 0..n {
                p.extend_subscription(now);
                now += Duration::hours(gap_hours);
            }
            prop_assert_eq!(p.pro_expiry, Some(start + Duration::days(30 * i64::from(n))));
        }
    }
}
