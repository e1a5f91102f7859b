use async_trait::async_trait;

use crate::image::ImagePayload;
use crate::result::{AiError, ImageAnalysis, parse_analysis_text};

/// Prompt sent alongside the image.
pub const ANALYSIS_PROMPT: &str = "Analyze this image and identify the item. Return a JSON object with the following fields:\n\
- name: A short, descriptive name of the item.\n\
- category: A broad category for the item (e.g., Electronics, Furniture, Tools).\n\
- price: An estimated value in USD (number only, no symbols).\n\
- description: A brief description of the item and its condition.\n\
- tags: An array of 3-5 keywords describing the item.\n\
Ensure the response is valid JSON and nothing else.";

/// Remote model that turns an image into free text.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn describe(&self, image: &ImagePayload) -> Result<String, AiError>;
}

/// Analyzer used when no model is configured. Every call fails with
/// [`AiError::NotConfigured`], which [`analyze_image`] degrades.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAnalyzer;

#[async_trait]
impl ImageAnalyzer for DisabledAnalyzer {
    async fn describe(&self, _image: &ImagePayload) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }
}

/// Analyze a client-supplied image.
///
/// Only malformed input is an error. Collaborator failures (not configured,
/// timeout, transport, bad output) degrade to the placeholder record.
pub async fn analyze_image(analyzer: &dyn ImageAnalyzer, raw_image: &str) -> Result<ImageAnalysis, AiError> {
    let image = ImagePayload::from_client_input(raw_image)?;
    match analyzer.describe(&image).await {
        Ok(text) => Ok(parse_analysis_text(&text)),
        Err(e) => {
            tracing::warn!(error = %e, "image analysis degraded to placeholder");
            Ok(ImageAnalysis::placeholder(""))
        }
    }
}
