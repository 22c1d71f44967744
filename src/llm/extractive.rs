/// Offline generator: answers with the best-matching excerpts verbatim.
use async_trait::async_trait;

use super::{GenerationRequest, Generator};
use crate::error::Result;
use crate::extract::chunking::truncate_chars;
use crate::utils::validation::QueryMode;

pub struct ExtractiveGenerator {
    max_passages: usize,
    max_excerpt_chars: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self {
            max_passages: 3,
            max_excerpt_chars: 400,
        }
    }
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut out = String::new();

        if request.passages.is_empty() {
            if request.mode == QueryMode::Bypass {
                out.push_str(&format!(
                    "Retrieval was bypassed; no document context is available for: {}",
                    request.query
                ));
            } else {
                out.push_str(&format!("No relevant content found for: {}", request.query));
            }
        } else {
            let shown = request.passages.len().min(self.max_passages);
            out.push_str(&format!(
                "Top {shown} of {} relevant excerpt(s) for: {}\n",
                request.passages.len(),
                request.query
            ));
            for (i, p) in request.passages.iter().take(shown).enumerate() {
                out.push_str(&format!(
                    "\n[{}] {} (chunk {}, score {:.3})\n{}\n",
                    i + 1,
                    p.document,
                    p.position,
                    p.similarity,
                    truncate_chars(&p.content, self.max_excerpt_chars)
                ));
            }
        }

        if !request.extra_context.is_empty() {
            out.push_str("\nProvided content:\n");
            for item in &request.extra_context {
                out.push_str(&format!("- {item}\n"));
            }
        }
        if !request.image_urls.is_empty() {
            out.push_str(&format!(
                "\n{} image(s) were supplied but cannot be analyzed offline.\n",
                request.image_urls.len()
            ));
        }

        Ok(out.trim_end().to_string())
    }
}
