use std::sync::Arc;

use assetkeep_ai::{AiError, ImageAnalysis, ImageAnalyzer, analyze_image};
use assetkeep_core::DomainError;

use super::ServiceResult;

/// Image tagging. Collaborator failures degrade inside `assetkeep-ai`; only
/// bad input reaches the caller as an error.
#[derive(Clone)]
pub struct AnalysisService {
    analyzer: Arc<dyn ImageAnalyzer>,
}

impl AnalysisService {
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub async fn analyze(&self, image: &str) -> ServiceResult<ImageAnalysis> {
        analyze_image(self.analyzer.as_ref(), image).await.map_err(|e| match e {
            AiError::InvalidInput(msg) => DomainError::validation(msg).into(),
            other => DomainError::ExternalService(other.to_string()).into(),
        })
    }
}
