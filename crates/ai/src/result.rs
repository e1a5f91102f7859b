use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub const UNKNOWN_ITEM: &str = "Unknown Item";
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Best-effort description of a photographed item.
///
/// This is *not* domain data. It is a suggestion the client shows in a form
/// before anything is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub name: String,
    pub category: String,
    /// Estimated value as a decimal string; `"0"` when unknown.
    pub price: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl ImageAnalysis {
    /// Fallback record used whenever the model output can't be used.
    pub fn placeholder(description: impl Into<String>) -> Self {
        Self {
            name: UNKNOWN_ITEM.to_string(),
            category: UNCATEGORIZED.to_string(),
            price: "0".to_string(),
            description: description.into(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid image input: {0}")]
    InvalidInput(String),

    #[error("image analysis is not configured")]
    NotConfigured,

    #[error("image analysis timed out")]
    Timeout,

    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    name: Option<String>,
    category: Option<String>,
    price: Option<JsonValue>,
    description: Option<String>,
    tags: Option<Vec<JsonValue>>,
}

/// Remove markdown code fences the model sometimes wraps its JSON in.
fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

fn price_text(value: Option<JsonValue>) -> String {
    match value {
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::String(s)) => {
            let cleaned: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            if cleaned.is_empty() { "0".to_string() } else { cleaned }
        }
        _ => "0".to_string(),
    }
}

/// Turn raw model output into an [`ImageAnalysis`].
///
/// Never fails: unparseable text yields the placeholder with the raw text as
/// its description. Missing fields fall back to placeholder values.
pub fn parse_analysis_text(text: &str) -> ImageAnalysis {
    let cleaned = strip_fences(text);
    let raw: RawAnalysis = match serde_json::from_str(&cleaned) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "model output is not the expected JSON object");
            return ImageAnalysis::placeholder(text);
        }
    };

    let non_empty = |s: Option<String>, fallback: &str| {
        s.map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };

    ImageAnalysis {
        name: non_empty(raw.name, UNKNOWN_ITEM),
        category: non_empty(raw.category, UNCATEGORIZED),
        price: price_text(raw.price),
        description: raw.description.unwrap_or_default(),
        tags: raw
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| match t {
                JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
    }
}
