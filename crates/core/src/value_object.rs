//! Value objects: equality by value, not identity.

use core::fmt;
use core::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A non-negative amount of money with two implied fraction digits.
///
/// Stored as integer cents. On the wire it is a decimal string (`"120.00"`);
/// input accepts either a string or a JSON number with at most two fraction
/// digits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl ValueObject for Price {}

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_cents(cents: i64) -> DomainResult<Self> {
        if cents < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(Self(cents))
    }

    /// Negative input is floored at zero.
    pub const fn clamped(cents: i64) -> Self {
        if cents < 0 { Price(0) } else { Price(cents) }
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Sum that saturates instead of overflowing.
    pub fn saturating_add(self, other: Price) -> Price {
        Price(self.0.saturating_add(other.0))
    }

    /// Saturating difference, floored at zero.
    pub fn saturating_sub(self, other: Price) -> Price {
        Price(self.0.saturating_sub(other.0).max(0))
    }

    /// Decimal value rounded to two digits, for JSON number reporting.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn from_f64(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::validation("price must be a finite number"));
        }
        if value < 0.0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        let scaled = value * 100.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return Err(DomainError::validation("price allows at most two decimal places"));
        }
        if rounded > i64::MAX as f64 {
            return Err(DomainError::validation("price is too large"));
        }
        Ok(Self(rounded as i64))
    }
}

impl core::iter::Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Self {
        iter.fold(Price::ZERO, Price::saturating_add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(DomainError::validation("price cannot be negative"));
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !digits(whole) || !digits(frac) {
            return Err(DomainError::validation(format!("invalid price: '{s}'")));
        }
        if frac.len() > 2 {
            return Err(DomainError::validation("price allows at most two decimal places"));
        }

        let too_large = || DomainError::validation("price is too large");
        let whole: i64 = whole.parse().map_err(|_| too_large())?;
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| too_large())? * 10,
            _ => frac.parse().map_err(|_| too_large())?,
        };
        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .map(Price)
            .ok_or_else(too_large)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriceVisitor;

        impl Visitor<'_> for PriceVisitor {
            type Value = Price;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative decimal number or string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(100))
                    .map(Price)
                    .ok_or_else(|| E::custom("price is too large"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
                if v < 0 {
                    return Err(E::custom("price cannot be negative"));
                }
                self.visit_u64(v as u64)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
                Price::from_f64(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PriceVisitor)
    }
}
