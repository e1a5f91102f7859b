use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analyzer::{ANALYSIS_PROMPT, ImageAnalyzer};
use crate::image::ImagePayload;
use crate::result::AiError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiImageAnalyzer {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiImageAnalyzer {
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::InferenceFailed(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn first_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
}

#[async_trait]
impl ImageAnalyzer for GeminiImageAnalyzer {
    async fn describe(&self, image: &ImagePayload) -> Result<String, AiError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text { text: ANALYSIS_PROMPT },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::InferenceFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::InferenceFailed(format!("model returned HTTP {status}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::InferenceFailed(format!("unreadable response: {e}")))?;

        tracing::debug!(model = %self.config.model, "image analysis completed");
        first_text(parsed).ok_or_else(|| AiError::InferenceFailed("model returned no text".to_string()))
    }
}
