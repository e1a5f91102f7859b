//! `assetkeep-auth`: identity, credentials and authorization policy.
//!
//! This crate is intentionally decoupled from HTTP and storage: it models
//! profiles and tokens, and answers policy questions.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod profile;

pub use authorize::{AuthzError, ensure_deletable, require_admin, require_self};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, IssuedToken, JwtIssuer, JwtValidator, TokenSigningError};
pub use password::{MIN_PASSWORD_LEN, PasswordError, hash_password, validate_password, verify_password};
pub use principal::Principal;
pub use profile::{
    AccountUpdate, ExternalIdentity, IdentityProvider, Profile, ProfileUpdate, SUBSCRIPTION_PERIOD_DAYS,
    SubscriptionToggle,
};
