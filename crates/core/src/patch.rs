//! Partial-update field helpers.

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable patch field.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: absent keeps the value, `null` clears it.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim a free-text value, mapping blank input to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn distinguishes_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);

        let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note": "hi"}"#).unwrap();
        assert_eq!(set.note, Some(Some("hi".to_string())));
    }

    #[test]
    fn blank_text_is_none() {
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(Some(" x ".into())), Some("x".into()));
    }
}
