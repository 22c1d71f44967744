//! OpenAI-compatible embedding provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::Embedder;
use crate::config::Settings;
use crate::error::{RagError, Result};
use crate::utils::retry::{ApiError, RetryPolicy};

/// Inputs sent per request.
const BATCH_SIZE: usize = 100;

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn from_settings(settings: &Settings, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.performance.request_timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: settings.openai.base_url.trim_end_matches('/').to_string(),
            model: settings.openai.embedding_model.clone(),
            dimensions: settings.openai.embedding_dim,
            retry: RetryPolicy::from_settings(&settings.performance),
        })
    }

    async fn request(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ApiError> {
        let payload = json!({
            "input": texts,
            "model": self.model,
            "dimensions": self.dimensions,
            "encoding_format": "float",
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ApiError::permanent(format!("failed to parse response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(ApiError::permanent(format!(
                "response data count mismatch: expected {}, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(ApiError::permanent(format!(
                "expected {}-dimensional embeddings, got {}",
                self.dimensions,
                bad.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            debug!("Requesting {} embeddings from {}", batch.len(), self.model);
            let vectors = self
                .retry
                .retry_if(|| self.request(batch), |e| e.retryable)
                .await
                .map_err(|e| RagError::Embedding(e.to_string()))?;
            out.extend(vectors);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
