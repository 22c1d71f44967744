//! OpenAI-compatible chat completion generator.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{GenerationRequest, Generator};
use crate::config::Settings;
use crate::error::{RagError, Result};
use crate::utils::retry::{ApiError, RetryPolicy};

const SYSTEM_PROMPT: &str = "You answer questions about a user's documents. \
Use the numbered excerpts as your primary source and cite them as [n]. \
If the excerpts do not contain the answer, say so.";

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    llm_model: String,
    vision_model: String,
    retry: RetryPolicy,
}

impl OpenAiGenerator {
    pub fn from_settings(settings: &Settings, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.performance.request_timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: settings.openai.base_url.trim_end_matches('/').to_string(),
            llm_model: settings.openai.llm_model.clone(),
            vision_model: settings.openai.vision_model.clone(),
            retry: RetryPolicy::from_settings(&settings.performance),
        })
    }

    fn model_for(&self, request: &GenerationRequest) -> &str {
        if request.image_urls.is_empty() {
            &self.llm_model
        } else {
            &self.vision_model
        }
    }

    fn payload(&self, request: &GenerationRequest) -> Value {
        let prompt = build_prompt(request);
        let user_content = if request.image_urls.is_empty() {
            Value::String(prompt)
        } else {
            let mut parts = vec![json!({"type": "text", "text": prompt})];
            parts.extend(
                request
                    .image_urls
                    .iter()
                    .map(|url| json!({"type": "image_url", "image_url": {"url": url}})),
            );
            Value::Array(parts)
        };

        json!({
            "model": self.model_for(request),
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_content},
            ],
        })
    }

    async fn request(&self, payload: &Value) -> std::result::Result<String, ApiError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ApiError::permanent(format!("failed to parse response: {e}")))?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::permanent("response has no message content"))
    }
}

/// Render the user message: numbered excerpts, supplied content, question.
fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    if !request.passages.is_empty() {
        prompt.push_str("Excerpts:\n");
        for (i, p) in request.passages.iter().enumerate() {
            prompt.push_str(&format!("[{}] ({})\n{}\n\n", i + 1, p.document, p.content));
        }
    }
    if !request.extra_context.is_empty() {
        prompt.push_str("Additional content provided with the question:\n");
        for item in &request.extra_context {
            prompt.push_str(item);
            prompt.push_str("\n\n");
        }
    }
    prompt.push_str("Question: ");
    prompt.push_str(&request.query);
    prompt
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let payload = self.payload(request);
        debug!(
            "Requesting completion from {} with {} passage(s)",
            self.model_for(request),
            request.passages.len()
        );
        self.retry
            .retry_if(|| self.request(&payload), |e| e.retryable)
            .await
            .map_err(|e| RagError::Generation(e.to_string()))
    }
}
