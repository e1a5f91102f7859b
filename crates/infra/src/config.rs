//! Configuration loading and representation.
//!
//! Everything comes from the process environment (a `.env` file is loaded
//! first when present). Missing optional values fall back to development
//! defaults; malformed values are errors.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "assetkeep-dev-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(&self) -> bool {
        matches!(self, AppEnv::Production)
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(format!("expected development or production, got '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct PayPalSettings {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: AppEnv,
    pub host: String,
    pub port: u16,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_timeout: Duration,
    pub jwt_secret: String,
    pub jwt_expires_days: i64,
    pub gemini: Option<GeminiSettings>,
    pub paypal: Option<PayPalSettings>,
    pub frontend_url: Option<String>,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("jwt_expires_days", &self.jwt_expires_days)
            .field("gemini", &self.gemini.as_ref().map(|g| g.model.as_str()))
            .field("paypal", &self.paypal.is_some())
            .field("frontend_url", &self.frontend_url)
            .finish()
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env: AppEnv = parse_or(&lookup, "APP_ENV", AppEnv::Development)?;

        let jwt_secret = match non_empty(&lookup, "JWT_SECRET") {
            Some(secret) => secret,
            None if env.is_production() => return Err(ConfigError::Missing("JWT_SECRET")),
            None => DEV_JWT_SECRET.to_string(),
        };

        let jwt_expires_days: i64 = parse_or(&lookup, "JWT_EXPIRES_DAYS", 7)?;
        if jwt_expires_days <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_EXPIRES_DAYS",
                reason: "must be positive".to_string(),
            });
        }

        let gemini = match non_empty(&lookup, "GEMINI_API_KEY") {
            Some(api_key) => Some(GeminiSettings {
                api_key,
                model: non_empty(&lookup, "GEMINI_MODEL").unwrap_or_else(|| assetkeep_ai::gemini::DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(parse_or(&lookup, "AI_TIMEOUT_SECS", 30)?),
            }),
            None => None,
        };

        let paypal = match (non_empty(&lookup, "PAYPAL_CLIENT_ID"), non_empty(&lookup, "PAYPAL_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(PayPalSettings { client_id, client_secret }),
            _ => None,
        };

        Ok(Self {
            env,
            host: non_empty(&lookup, "HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 5001)?,
            database_url: non_empty(&lookup, "DATABASE_URL"),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            db_connect_timeout: Duration::from_secs(parse_or(&lookup, "DB_CONNECT_TIMEOUT_SECS", 10)?),
            jwt_secret,
            jwt_expires_days,
            gemini,
            paypal,
            frontend_url: non_empty(&lookup, "FRONTEND_URL"),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn jwt_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.jwt_expires_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(move |name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_in_development() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.env, AppEnv::Development);
        assert_eq!(cfg.server_addr(), "0.0.0.0:5001");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.jwt_expires_days, 7);
        assert_eq!(cfg.db_max_connections, 5);
        assert!(cfg.gemini.is_none());
        assert!(cfg.paypal.is_none());
    }

    #[test]
    fn production_requires_a_jwt_secret() {
        assert_eq!(load(&[("APP_ENV", "production")]).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        let cfg = load(&[("APP_ENV", "production"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert!(cfg.env.is_production());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert!(matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            load(&[("JWT_EXPIRES_DAYS", "0")]),
            Err(ConfigError::Invalid { name: "JWT_EXPIRES_DAYS", .. })
        ));
    }

    #[test]
    fn collaborators_are_enabled_by_credentials() {
        let cfg = load(&[
            ("GEMINI_API_KEY", "key"),
            ("PAYPAL_CLIENT_ID", "id"),
            ("PAYPAL_CLIENT_SECRET", "secret"),
        ])
        .unwrap();
        let gemini = cfg.gemini.unwrap();
        assert_eq!(gemini.model, "gemini-flash-latest");
        assert_eq!(gemini.timeout, Duration::from_secs(30));
        assert!(cfg.paypal.is_some());

        // half-configured billing stays disabled
        assert!(load(&[("PAYPAL_CLIENT_ID", "id")]).unwrap().paypal.is_none());
    }
}
