/// Answer generation over retrieved context.
pub mod extractive;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Provider, Settings};
use crate::error::Result;
use crate::utils::validation::QueryMode;

pub use extractive::ExtractiveGenerator;
pub use openai::OpenAiGenerator;

/// A retrieved chunk handed to the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPassage {
    pub document: String,
    pub position: usize,
    pub content: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub query: String,
    pub mode: QueryMode,
    pub passages: Vec<ContextPassage>,
    /// Rendered tables and equations supplied with the query.
    pub extra_context: Vec<String>,
    /// Images to show a vision model.
    pub image_urls: Vec<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Build the generator for the configured provider.
pub fn from_settings(settings: &Settings, api_key: &str) -> Result<Arc<dyn Generator>> {
    Ok(match settings.rag.provider {
        Provider::Local => Arc::new(ExtractiveGenerator::default()),
        Provider::Openai => Arc::new(OpenAiGenerator::from_settings(settings, api_key)?),
    })
}
