//! `assetkeep-ai`
//!
//! **Responsibility:** image analysis boundary.
//!
//! This crate is intentionally **not** part of the domain model:
//! - It must not depend on inventory types.
//! - It must not mutate domain state.
//! - It returns *suggestions* for a client to review, never stored data.

pub mod analyzer;
pub mod gemini;
pub mod image;
pub mod result;

pub use analyzer::{DisabledAnalyzer, ImageAnalyzer, analyze_image};
pub use gemini::{GeminiConfig, GeminiImageAnalyzer};
pub use image::ImagePayload;
pub use result::{AiError, ImageAnalysis, parse_analysis_text};
