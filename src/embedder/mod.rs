/// Embedder trait and provider selection.
pub mod hash;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Provider, Settings};
use crate::error::Result;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;

/// Trait for text embedding implementations.
///
/// Implementations are shared behind `Arc` across concurrent file tasks.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple text strings into vectors, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Build the embedder for the configured provider.
pub fn from_settings(settings: &Settings, api_key: &str) -> Result<Arc<dyn Embedder>> {
    Ok(match settings.rag.provider {
        Provider::Local => Arc::new(HashEmbedder::new(settings.openai.embedding_dim)),
        Provider::Openai => Arc::new(OpenAiEmbedder::from_settings(settings, api_key)?),
    })
}
