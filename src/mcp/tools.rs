/// MCP tool handlers.
///
/// Six tools, all backed by the shared `RagManager`:
/// 1. process_directory              – index every supported file in a directory
/// 2. process_single_document        – index one file into its directory's instance
/// 3. query_directory                – retrieval-augmented question answering
/// 4. query_with_multimodal_content  – query with caller-supplied tables, equations, images
/// 5. list_processed_directories     – every live instance
/// 6. get_rag_info                   – details for one instance
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::config::MultimodalSettings;
use crate::error::RagError;
use crate::extract::ExtractOptions;
use crate::services::{DirectoryOptions, DocumentOptions, InstanceOptions, RagManager};
use crate::utils::validation::{ParseMethod, require_params, validate_positive, validate_range};

const SERVER_NAME: &str = "rag-anything-mcp";
const MAX_WORKERS_LIMIT: f64 = 64.0;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct ProcessDirectoryParams {
    /// Directory containing the documents to index
    directory_path: String,
    /// OpenAI-compatible API key
    api_key: String,
    /// Storage directory for this instance (default: derived from RAG_WORKING_DIR)
    working_dir: Option<String>,
    /// Override of the API base URL
    base_url: Option<String>,
    /// Extensions to include, e.g. [".pdf", ".md"] (default: configured list)
    file_extensions: Option<Vec<String>>,
    /// Descend into subdirectories (default: configured)
    recursive: Option<bool>,
    /// Collect image references (default: ENABLE_IMAGE_PROCESSING)
    enable_image_processing: Option<bool>,
    /// Collect tables (default: ENABLE_TABLE_PROCESSING)
    enable_table_processing: Option<bool>,
    /// Collect equations (default: ENABLE_EQUATION_PROCESSING)
    enable_equation_processing: Option<bool>,
    /// Files processed concurrently (default: RAG_MAX_WORKERS)
    max_workers: Option<i64>,
    /// Re-index files whose content is unchanged (default: false)
    force: Option<bool>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct ProcessDocumentParams {
    /// Path to the document
    file_path: String,
    /// OpenAI-compatible API key
    api_key: String,
    /// Storage directory for the parent directory's instance
    working_dir: Option<String>,
    /// Override of the API base URL
    base_url: Option<String>,
    /// Where to write the extracted text (optional)
    output_dir: Option<String>,
    /// Parse method: auto | ocr | txt (default: auto)
    parse_method: Option<String>,
    /// Collect image references (default: ENABLE_IMAGE_PROCESSING)
    enable_image_processing: Option<bool>,
    /// Collect tables (default: ENABLE_TABLE_PROCESSING)
    enable_table_processing: Option<bool>,
    /// Collect equations (default: ENABLE_EQUATION_PROCESSING)
    enable_equation_processing: Option<bool>,
    /// Re-index even if unchanged (default: false)
    force: Option<bool>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct QueryParams {
    /// A previously processed directory
    directory_path: String,
    /// Question in natural language
    query: String,
    /// Retrieval mode: hybrid | local | global | naive | mix | bypass (default: hybrid)
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct MultimodalQueryParams {
    /// A previously processed directory
    directory_path: String,
    /// Question in natural language
    query: String,
    /// Items such as {"type": "table", "table_data": "..."},
    /// {"type": "equation", "latex": "..."} or {"type": "image", "image_url": "..."}
    multimodal_content: Vec<Value>,
    /// Retrieval mode (default: hybrid)
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct DirectoryParam {
    /// A directory path
    directory_path: String,
}

// ── Response helpers ─────────────────────────────────────────────────

/// Serialize `value` and mark it successful.
fn success_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let body = serde_json::to_value(value)
        .map_err(|e| McpError::internal_error(format!("serialize failed: {e}"), None))?;
    let body = match body {
        Value::Object(mut map) => {
            map.insert("success".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "success": true, "result": other }),
    };
    json_result(body)
}

fn json_result(value: Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(value: Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    extensions
        .into_iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
        .collect()
}

/// Per-call flags override the configured multimodal defaults.
fn extract_options(
    defaults: &MultimodalSettings,
    parse_method: ParseMethod,
    images: Option<bool>,
    tables: Option<bool>,
    equations: Option<bool>,
) -> ExtractOptions {
    ExtractOptions {
        parse_method,
        images: images.unwrap_or(defaults.enable_image),
        tables: tables.unwrap_or(defaults.enable_table),
        equations: equations.unwrap_or(defaults.enable_equation),
    }
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub manager: Arc<RagManager>,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info.name = SERVER_NAME.to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info.instructions = Some(
            "Multimodal retrieval-augmented generation over local document directories. \
             Run process_directory first, then ask questions with query_directory."
                .to_string(),
        );
        info
    }
}

#[tool_router]
impl AppTools {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self {
            manager,
            tool_router: Self::tool_router(),
        }
    }

    /// Count the failure, log it, and turn it into a tool-level error result.
    fn fail(&self, tool: &str, err: &RagError) -> Result<CallToolResult, McpError> {
        let kind = match err {
            RagError::Validation(_) => "validation_error",
            RagError::FileNotFound(_) => "file_not_found",
            _ => "error",
        };
        self.manager
            .metrics()
            .increment(&format!("tools.{tool}.{kind}"));

        if err.is_client_error() || matches!(err, RagError::FileNotFound(_)) {
            warn!(tool, error_type = err.error_type(), "{err}");
        } else {
            error!(tool, error_type = err.error_type(), "{err}");
        }

        error_result(json!({
            "success": false,
            "error": err.to_string(),
            "error_type": err.error_type(),
        }))
    }

    fn begin(&self, tool: &str) -> crate::telemetry::TimerGuard {
        let metrics = self.manager.metrics();
        metrics.increment(&format!("tools.{tool}.invocations"));
        metrics.start_timer(format!("tools.{tool}"))
    }

    // ── Tool 1: process_directory ───────────────────────────────────

    #[tool(
        description = "Process every supported document (PDF, DOCX, TXT, MD) in a directory and index it for retrieval-augmented queries. Unchanged files are skipped unless force is set."
    )]
    async fn process_directory(
        &self,
        params: Parameters<ProcessDirectoryParams>,
    ) -> Result<CallToolResult, McpError> {
        const TOOL: &str = "process_directory";
        let _timer = self.begin(TOOL);
        let p = params.0;

        let run = async {
            require_params(&[("directory_path", &p.directory_path), ("api_key", &p.api_key)])?;
            if let Some(workers) = p.max_workers {
                validate_positive(workers, "max_workers")?;
                validate_range(workers as f64, "max_workers", Some(1.0), Some(MAX_WORKERS_LIMIT))?;
            }
            info!("Processing directory: {}", p.directory_path);

            let settings = self.manager.settings();
            let options = DirectoryOptions {
                extensions: p.file_extensions.clone().map(normalize_extensions),
                recursive: p.recursive.unwrap_or(settings.files.recursive),
                extract: extract_options(
                    &settings.multimodal,
                    ParseMethod::Auto,
                    p.enable_image_processing,
                    p.enable_table_processing,
                    p.enable_equation_processing,
                ),
                max_workers: p.max_workers.map(|w| w as usize),
                force: p.force.unwrap_or(false),
            };
            let instance = InstanceOptions {
                working_dir: p.working_dir.clone(),
                base_url: p.base_url.clone(),
            };
            self.manager
                .process_directory(&p.directory_path, &p.api_key, &instance, &options)
                .await
        };

        match run.await {
            Ok(report) => success_result(&report),
            Err(e) => self.fail(TOOL, &e),
        }
    }

    // ── Tool 2: process_single_document ─────────────────────────────

    #[tool(
        description = "Process and index a single document. It joins the index of its parent directory; optionally writes the extracted text to output_dir."
    )]
    async fn process_single_document(
        &self,
        params: Parameters<ProcessDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        const TOOL: &str = "process_single_document";
        let _timer = self.begin(TOOL);
        let p = params.0;

        let run = async {
            require_params(&[("file_path", &p.file_path), ("api_key", &p.api_key)])?;
            let parse_method: ParseMethod = p.parse_method.as_deref().unwrap_or("auto").parse()?;
            info!("Processing document: {}", p.file_path);

            let options = DocumentOptions {
                extract: extract_options(
                    &self.manager.settings().multimodal,
                    parse_method,
                    p.enable_image_processing,
                    p.enable_table_processing,
                    p.enable_equation_processing,
                ),
                output_dir: p.output_dir.as_deref().filter(|d| !d.trim().is_empty()).map(PathBuf::from),
                force: p.force.unwrap_or(false),
            };
            let instance = InstanceOptions {
                working_dir: p.working_dir.clone(),
                base_url: p.base_url.clone(),
            };
            self.manager
                .process_single_document(&p.file_path, &p.api_key, &instance, &options)
                .await
        };

        match run.await {
            Ok(outcome) => success_result(&outcome),
            Err(e) => self.fail(TOOL, &e),
        }
    }

    // ── Tool 3: query_directory ─────────────────────────────────────

    #[tool(
        description = "Ask a question about a processed directory. Modes: hybrid (default), local, global, naive, mix, bypass."
    )]
    async fn query_directory(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        const TOOL: &str = "query_directory";
        let _timer = self.begin(TOOL);
        let p = params.0;

        let run = async {
            require_params(&[("directory_path", &p.directory_path), ("query", &p.query)])?;
            info!("Querying directory: {}", p.directory_path);
            let mode = p.mode.as_deref().unwrap_or("hybrid");
            self.manager
                .query_directory(&p.directory_path, &p.query, mode)
                .await
        };

        match run.await {
            Ok(result) => success_result(&result),
            Err(e) => self.fail(TOOL, &e),
        }
    }

    // ── Tool 4: query_with_multimodal_content ───────────────────────

    #[tool(
        description = "Query a processed directory together with extra content: tables (table_data), equations (latex) and images (image_url or image_path)."
    )]
    async fn query_with_multimodal_content(
        &self,
        params: Parameters<MultimodalQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        const TOOL: &str = "query_with_multimodal_content";
        let _timer = self.begin(TOOL);
        let p = params.0;

        let run = async {
            require_params(&[("directory_path", &p.directory_path), ("query", &p.query)])?;
            info!("Multimodal query on directory: {}", p.directory_path);
            let mode = p.mode.as_deref().unwrap_or("hybrid");
            self.manager
                .query_with_multimodal(&p.directory_path, &p.query, &p.multimodal_content, mode)
                .await
        };

        match run.await {
            Ok(result) => success_result(&result),
            Err(e) => self.fail(TOOL, &e),
        }
    }

    // ── Tool 5: list_processed_directories ──────────────────────────

    #[tool(description = "List every directory that currently has a RAG instance")]
    async fn list_processed_directories(&self) -> Result<CallToolResult, McpError> {
        const TOOL: &str = "list_processed_directories";
        let _timer = self.begin(TOOL);
        info!("Listing processed directories");

        match self.manager.list_processed_directories().await {
            Ok(directories) => json_result(json!({
                "success": true,
                "total_count": directories.len(),
                "directories": directories,
            })),
            Err(e) => self.fail(TOOL, &e),
        }
    }

    // ── Tool 6: get_rag_info ────────────────────────────────────────

    #[tool(description = "Show the state of the RAG instance for a directory")]
    async fn get_rag_info(
        &self,
        params: Parameters<DirectoryParam>,
    ) -> Result<CallToolResult, McpError> {
        const TOOL: &str = "get_rag_info";
        let _timer = self.begin(TOOL);
        let p = params.0;

        let run = async {
            require_params(&[("directory_path", &p.directory_path)])?;
            info!("Getting RAG info for: {}", p.directory_path);
            self.manager.get_rag_info(&p.directory_path).await
        };

        match run.await {
            Ok(Some(info)) => json_result(json!({ "success": true, "info": info })),
            Ok(None) => error_result(json!({
                "success": false,
                "error": format!("No RAG instance found for directory: {}", p.directory_path),
                "error_type": "NotFoundError",
            })),
            Err(e) => self.fail(TOOL, &e),
        }
    }
}
