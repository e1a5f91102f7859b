use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::result::AiError;

const DEFAULT_MIME: &str = "image/jpeg";

/// A base64 image ready to send to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    /// Accept either a bare base64 string or a `data:image/<type>;base64,` URI.
    pub fn from_client_input(raw: &str) -> Result<Self, AiError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AiError::InvalidInput("Image data is required".to_string()));
        }

        let (mime_type, data) = match raw.strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) = rest
                    .split_once(',')
                    .ok_or_else(|| AiError::InvalidInput("malformed data URI".to_string()))?;
                let mime = meta
                    .strip_suffix(";base64")
                    .filter(|m| m.starts_with("image/"))
                    .ok_or_else(|| AiError::InvalidInput("expected a base64 image data URI".to_string()))?;
                (mime.to_string(), data)
            }
            None => (DEFAULT_MIME.to_string(), raw),
        };

        let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() || STANDARD.decode(&data).is_err() {
            return Err(AiError::InvalidInput("image is not valid base64".to_string()));
        }

        Ok(Self { mime_type, data })
    }
}
