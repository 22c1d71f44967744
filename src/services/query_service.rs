//! Retrieval and answer generation over one directory's vector store.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::extract::chunking::truncate_chars;
use crate::llm::{ContextPassage, GenerationRequest, Generator};
use crate::store::{SearchHit, Store};
use crate::telemetry::MetricsCollector;
use crate::utils::validation::QueryMode;

const EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub document: String,
    pub position: usize,
    pub relevance_score: f32,
    pub excerpt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryMetadata {
    pub working_dir: String,
    pub total_sources: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub mode: QueryMode,
    pub response: String,
    pub sources: Vec<Source>,
    pub metadata: QueryMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MultimodalAnalysis {
    pub tables_processed: usize,
    pub equations_processed: usize,
    pub images_processed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultimodalQueryResult {
    pub query: String,
    pub mode: QueryMode,
    pub multimodal_items: usize,
    pub response: String,
    pub sources: Vec<Source>,
    pub multimodal_analysis: MultimodalAnalysis,
    pub metadata: QueryMetadata,
}

/// Multimodal items reduced to what retrieval and generation use.
#[derive(Debug, Default, PartialEq)]
struct MultimodalContext {
    items: usize,
    analysis: MultimodalAnalysis,
    extra_context: Vec<String>,
    image_urls: Vec<String>,
}

pub struct QueryService {
    settings: Arc<Settings>,
    working_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: Arc<TokioMutex<Store>>,
    metrics: Arc<MetricsCollector>,
    cache: Option<Cache<String, QueryResult>>,
}

impl QueryService {
    pub fn new(
        settings: Arc<Settings>,
        working_dir: PathBuf,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<TokioMutex<Store>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let cache = settings.cache.enabled.then(|| {
            Cache::builder()
                .max_capacity(settings.cache.max_size)
                .time_to_live(Duration::from_secs(settings.cache.ttl_secs))
                .build()
        });
        info!("Query service initialized for: {}", working_dir.display());

        Self {
            settings,
            working_dir,
            embedder,
            generator,
            store,
            metrics,
            cache,
        }
    }

    /// Answer `query` from the indexed documents.
    ///
    /// Results are cached per `mode:query` when caching is enabled.
    pub async fn query(&self, query: &str, mode: &str) -> Result<QueryResult> {
        let mode: QueryMode = mode.parse()?;
        let mode_label = [("mode", mode.as_str())];

        info!(
            "Executing query with mode '{mode}': {}",
            truncate_chars(query, 100)
        );
        self.metrics
            .increment_labeled("query_service.queries.started", &mode_label);

        let cache_key = format!("{mode}:{query}");
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&cache_key).await {
                debug!("Cache hit for query: {}", truncate_chars(query, 50));
                self.metrics.increment("query_service.cache.hit");
                return Ok(hit);
            }
        }

        let _timer = self
            .metrics
            .start_timer(format!("query_service.query.{mode}"));
        let started = Instant::now();

        let outcome = async {
            let hits = self.retrieve(query, mode).await?;
            let request = GenerationRequest {
                query: query.to_string(),
                mode,
                passages: to_passages(&hits),
                ..GenerationRequest::default()
            };
            let response = self.generator.generate(&request).await?;
            Ok::<_, RagError>((hits, response))
        }
        .await;

        match outcome {
            Ok((hits, response)) => {
                let result = QueryResult {
                    query: query.to_string(),
                    mode,
                    response,
                    metadata: self.metadata(hits.len(), started),
                    sources: to_sources(&hits),
                };
                if let Some(cache) = &self.cache {
                    cache.insert(cache_key, result.clone()).await;
                }
                self.metrics
                    .increment_labeled("query_service.queries.success", &mode_label);
                info!("Query completed successfully");
                Ok(result)
            }
            Err(e) => {
                self.metrics
                    .increment_labeled("query_service.queries.error", &mode_label);
                error!("Error executing query: {e}");
                Err(e)
            }
        }
    }

    /// Answer `query` with tables, equations, and images supplied by the caller.
    ///
    /// Never cached.
    pub async fn query_with_multimodal(
        &self,
        query: &str,
        items: &[Value],
        mode: &str,
    ) -> Result<MultimodalQueryResult> {
        let mode: QueryMode = mode.parse()?;
        let mode_label = [("mode", mode.as_str())];

        info!("Executing multimodal query with {} items", items.len());
        self.metrics
            .increment_labeled("query_service.multimodal_queries.started", &mode_label);
        let _timer = self
            .metrics
            .start_timer(format!("query_service.multimodal_query.{mode}"));
        let started = Instant::now();

        let outcome = async {
            let context = validate_multimodal_content(items)?;

            let mut retrieval_text = query.to_string();
            for extra in &context.extra_context {
                retrieval_text.push('\n');
                retrieval_text.push_str(extra);
            }
            let hits = self.retrieve(&retrieval_text, mode).await?;

            let request = GenerationRequest {
                query: query.to_string(),
                mode,
                passages: to_passages(&hits),
                extra_context: context.extra_context.clone(),
                image_urls: context.image_urls.clone(),
            };
            let response = self.generator.generate(&request).await?;
            Ok::<_, RagError>((context, hits, response))
        }
        .await;

        match outcome {
            Ok((context, hits, response)) => {
                self.metrics
                    .increment_labeled("query_service.multimodal_queries.success", &mode_label);
                info!("Multimodal query completed successfully");
                Ok(MultimodalQueryResult {
                    query: query.to_string(),
                    mode,
                    multimodal_items: context.items,
                    response,
                    metadata: self.metadata(hits.len(), started),
                    sources: to_sources(&hits),
                    multimodal_analysis: context.analysis,
                })
            }
            Err(e) => {
                self.metrics
                    .increment_labeled("query_service.multimodal_queries.error", &mode_label);
                error!("Error executing multimodal query: {e}");
                Err(e)
            }
        }
    }

    /// Drop every cached answer; called after the index changes.
    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            debug!("Query cache invalidated for: {}", self.working_dir.display());
        }
    }

    /// Chunks relevant to `text` under `mode`, best first.
    async fn retrieve(&self, text: &str, mode: QueryMode) -> Result<Vec<SearchHit>> {
        if mode == QueryMode::Bypass {
            return Ok(Vec::new());
        }

        let top_k = self.settings.rag.search_top_k;
        let vector = self.embedder.embed(text).await?;
        let store = self.store.lock().await;

        let hits = match mode {
            QueryMode::Naive => store.search(&vector, top_k)?,
            QueryMode::Local => local_hits(&store, &vector, top_k)?,
            QueryMode::Global => store.best_per_document(&vector, top_k)?,
            QueryMode::Hybrid | QueryMode::Mix => {
                let mut merged = local_hits(&store, &vector, top_k)?;
                merged.extend(store.best_per_document(&vector, top_k)?);
                dedup_by_similarity(merged)
            }
            QueryMode::Bypass => Vec::new(),
        };
        debug!("Retrieved {} chunk(s) in {mode} mode", hits.len());
        Ok(hits)
    }

    fn metadata(&self, total_sources: usize, started: Instant) -> QueryMetadata {
        QueryMetadata {
            working_dir: self.working_dir.display().to_string(),
            total_sources,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Top chunks from the single best-matching document.
fn local_hits(store: &Store, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
    match store.search(vector, 1)?.into_iter().next() {
        Some(best) => store.search_in_document(vector, &best.document, top_k),
        None => Ok(Vec::new()),
    }
}

fn dedup_by_similarity(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    let mut seen = HashSet::new();
    hits.retain(|h| seen.insert((h.document.clone(), h.position)));
    hits
}

fn to_passages(hits: &[SearchHit]) -> Vec<ContextPassage> {
    hits.iter()
        .map(|h| ContextPassage {
            document: h.document.clone(),
            position: h.position,
            content: h.content.clone(),
            similarity: h.similarity,
        })
        .collect()
}

fn to_sources(hits: &[SearchHit]) -> Vec<Source> {
    hits.iter()
        .map(|h| Source {
            document: h.document.clone(),
            position: h.position,
            relevance_score: h.similarity,
            excerpt: truncate_chars(&h.content, EXCERPT_CHARS),
        })
        .collect()
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn validate_multimodal_content(items: &[Value]) -> Result<MultimodalContext> {
    let mut ctx = MultimodalContext {
        items: items.len(),
        ..MultimodalContext::default()
    };

    for item in items {
        let obj = item
            .as_object()
            .ok_or_else(|| RagError::validation("Each multimodal item must be an object"))?;
        let item_type = obj
            .get("type")
            .ok_or_else(|| RagError::validation("Each multimodal item must have a 'type' field"))?;
        let item_type = render_value(item_type);

        match item_type.as_str() {
            "table" => {
                let data = obj.get("table_data").ok_or_else(|| {
                    RagError::validation("Table items must have 'table_data' field")
                })?;
                ctx.analysis.tables_processed += 1;
                let mut rendered = format!("Table: {}", render_value(data));
                if let Some(caption) = obj.get("table_caption") {
                    rendered.push_str(&format!(" (caption: {})", render_value(caption)));
                }
                ctx.extra_context.push(rendered);
            }
            "equation" => {
                let latex = obj.get("latex").ok_or_else(|| {
                    RagError::validation("Equation items must have 'latex' field")
                })?;
                ctx.analysis.equations_processed += 1;
                let mut rendered = format!("Equation: {}", render_value(latex));
                if let Some(caption) = obj.get("equation_caption") {
                    rendered.push_str(&format!(" ({})", render_value(caption)));
                }
                ctx.extra_context.push(rendered);
            }
            "image" => {
                let url = obj.get("image_url");
                if url.is_none() && !obj.contains_key("image_path") {
                    return Err(RagError::validation(
                        "Image items must have 'image_url' or 'image_path' field",
                    ));
                }
                ctx.analysis.images_processed += 1;
                if let Some(url) = url {
                    ctx.image_urls.push(render_value(url));
                }
            }
            other => warn!("Unknown multimodal content type: {other}"),
        }
    }

    Ok(ctx)
}
