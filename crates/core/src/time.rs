//! Lenient timestamp input.
//!
//! Clients send either full RFC 3339 timestamps or bare calendar dates
//! (`2025-03-01`, read as midnight UTC).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{DomainError, DomainResult};

pub fn parse_timestamp(raw: &str) -> DomainResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DomainError::validation(format!("invalid date: '{raw}'")))
}

/// `Option<DateTime<Utc>>` field; `null` and `""` both read as `None`.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Patch field: absent → `None`, `null` → `Some(None)`, value → `Some(Some(_))`.
pub fn deserialize_patch<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_optional(deserializer).map(Some)
}
