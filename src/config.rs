/// Configuration module for the RAG Anything MCP server.
///
/// Settings come from an optional JSON file, then environment variables
/// (upper-case names such as `OPENAI_API_KEY`, `ENVIRONMENT`, `DEBUG`),
/// then validation. Every field has a default so an empty environment
/// yields a working configuration.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

const VALID_LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];
const VALID_ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];

// ── Default value functions ──────────────────────────────────────────

fn default_app_name() -> String {
    "rag-anything-mcp".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_embedding_dim() -> usize {
    3072
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("./rag_storage")
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_max_workers() -> usize {
    4
}

fn default_search_top_k() -> usize {
    5
}

fn default_extensions() -> Vec<String> {
    [".pdf", ".docx", ".pptx", ".txt", ".md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_file_size_mb() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_max_size() -> u64 {
    1000
}

// ── Settings structs ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Which backend produces embeddings and answers.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible HTTP API.
    Openai,
    /// In-process hash embedder and extractive answers; no network.
    Local,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub openai: OpenAiSettings,

    #[serde(default)]
    pub rag: RagSettings,

    #[serde(default)]
    pub files: FileSettings,

    #[serde(default)]
    pub multimodal: MultimodalSettings,

    #[serde(default)]
    pub performance: PerformanceSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiSettings {
    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RagSettings {
    #[serde(default = "default_provider")]
    pub provider: Provider,

    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
}

fn default_provider() -> Provider {
    Provider::Openai
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FileSettings {
    #[serde(default = "default_extensions")]
    pub supported_extensions: Vec<String>,

    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    #[serde(default = "default_true")]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MultimodalSettings {
    #[serde(default = "default_true")]
    pub enable_image: bool,

    #[serde(default = "default_true")]
    pub enable_table: bool,

    #[serde(default = "default_true")]
    pub enable_equation: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceSettings {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_factor")]
    pub retry_backoff_factor: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_max_size")]
    pub max_size: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: default_version(),
            environment: default_environment(),
            debug: false,
            logging: LoggingSettings::default(),
            openai: OpenAiSettings::default(),
            rag: RagSettings::default(),
            files: FileSettings::default(),
            multimodal: MultimodalSettings::default(),
            performance: PerformanceSettings::default(),
            cache: CacheSettings::default(),
            metrics_enabled: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file_path: None,
        }
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            llm_model: default_llm_model(),
            vision_model: default_vision_model(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            working_dir: default_working_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_workers: default_max_workers(),
            search_top_k: default_search_top_k(),
        }
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            supported_extensions: default_extensions(),
            max_file_size_mb: default_max_file_size_mb(),
            recursive: true,
        }
    }
}

impl Default for MultimodalSettings {
    fn default() -> Self {
        Self {
            enable_image: true,
            enable_table: true,
            enable_equation: true,
        }
    }
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_factor: default_backoff_factor(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_size: default_cache_max_size(),
        }
    }
}

// ── Settings implementation ──────────────────────────────────────────

impl Settings {
    /// Load settings from `config_path` (if it exists) and the process
    /// environment, then normalize and validate them.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let base = match config_path {
            Some(path) if path.exists() => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?;
                let cfg: Settings = serde_json::from_str(&data)
                    .with_context(|| format!("invalid JSON in {}", path.display()))?;
                info!("Loaded configuration from {}", path.display());
                cfg
            }
            Some(path) => {
                warn!("{} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        base.with_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from defaults plus a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_lookup(lookup)
    }

    fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.apply_overrides(&lookup)?;
        self.normalize()?;
        self.validate()?;
        crate::utils::files::ensure_directory(&self.rag.working_dir).with_context(|| {
            format!(
                "failed to create working directory: {}",
                self.rag.working_dir.display()
            )
        })?;
        Ok(self)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = get("VERSION") {
            self.version = v;
        }
        if let Some(v) = get("ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = get("DEBUG") {
            self.debug = parse_bool("DEBUG", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.logging.format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => anyhow::bail!("LOG_FORMAT must be json or text, got {other}"),
            };
        }
        if let Some(v) = get("LOG_FILE_PATH") {
            self.logging.file_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        if let Some(v) = get("OPENAI_LLM_MODEL") {
            self.openai.llm_model = v;
        }
        if let Some(v) = get("OPENAI_VISION_MODEL") {
            self.openai.vision_model = v;
        }
        if let Some(v) = get("OPENAI_EMBEDDING_MODEL") {
            self.openai.embedding_model = v;
        }
        if let Some(v) = get("OPENAI_EMBEDDING_DIM") {
            self.openai.embedding_dim = parse_num("OPENAI_EMBEDDING_DIM", &v)?;
        }
        if let Some(v) = get("RAG_PROVIDER") {
            self.rag.provider = match v.to_lowercase().as_str() {
                "openai" => Provider::Openai,
                "local" => Provider::Local,
                other => anyhow::bail!("RAG_PROVIDER must be openai or local, got {other}"),
            };
        }
        if let Some(v) = get("RAG_WORKING_DIR") {
            self.rag.working_dir = PathBuf::from(v);
        }
        if let Some(v) = get("RAG_DEFAULT_CHUNK_SIZE") {
            self.rag.chunk_size = parse_num("RAG_DEFAULT_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_OVERLAP") {
            self.rag.chunk_overlap = parse_num("RAG_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("RAG_MAX_WORKERS") {
            self.rag.max_workers = parse_num("RAG_MAX_WORKERS", &v)?;
        }
        if let Some(v) = get("RAG_SEARCH_TOP_K") {
            self.rag.search_top_k = parse_num("RAG_SEARCH_TOP_K", &v)?;
        }
        if let Some(v) = get("SUPPORTED_FILE_EXTENSIONS") {
            self.files.supported_extensions = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("MAX_FILE_SIZE_MB") {
            self.files.max_file_size_mb = parse_num("MAX_FILE_SIZE_MB", &v)?;
        }
        if let Some(v) = get("ENABLE_RECURSIVE_PROCESSING") {
            self.files.recursive = parse_bool("ENABLE_RECURSIVE_PROCESSING", &v)?;
        }
        if let Some(v) = get("ENABLE_IMAGE_PROCESSING") {
            self.multimodal.enable_image = parse_bool("ENABLE_IMAGE_PROCESSING", &v)?;
        }
        if let Some(v) = get("ENABLE_TABLE_PROCESSING") {
            self.multimodal.enable_table = parse_bool("ENABLE_TABLE_PROCESSING", &v)?;
        }
        if let Some(v) = get("ENABLE_EQUATION_PROCESSING") {
            self.multimodal.enable_equation = parse_bool("ENABLE_EQUATION_PROCESSING", &v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT") {
            self.performance.request_timeout_secs = parse_num("REQUEST_TIMEOUT", &v)?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            self.performance.max_retries = parse_num("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("RETRY_BACKOFF_FACTOR") {
            self.performance.retry_backoff_factor = parse_num("RETRY_BACKOFF_FACTOR", &v)?;
        }
        if let Some(v) = get("ENABLE_CACHE") {
            self.cache.enabled = parse_bool("ENABLE_CACHE", &v)?;
        }
        if let Some(v) = get("CACHE_TTL") {
            self.cache.ttl_secs = parse_num("CACHE_TTL", &v)?;
        }
        if let Some(v) = get("CACHE_MAX_SIZE") {
            self.cache.max_size = parse_num("CACHE_MAX_SIZE", &v)?;
        }
        if let Some(v) = get("ENABLE_METRICS") {
            self.metrics_enabled = parse_bool("ENABLE_METRICS", &v)?;
        }
        Ok(())
    }

    /// Canonicalize case-insensitive fields.
    fn normalize(&mut self) -> Result<()> {
        let level = self.logging.level.to_uppercase();
        anyhow::ensure!(
            VALID_LOG_LEVELS.contains(&level.as_str()),
            "LOG_LEVEL must be one of {VALID_LOG_LEVELS:?}"
        );
        self.logging.level = level;

        let env = self.environment.to_lowercase();
        anyhow::ensure!(
            VALID_ENVIRONMENTS.contains(&env.as_str()),
            "ENVIRONMENT must be one of {VALID_ENVIRONMENTS:?}"
        );
        self.environment = env;

        for ext in &mut self.files.supported_extensions {
            let lowered = ext.to_lowercase();
            *ext = if lowered.starts_with('.') {
                lowered
            } else {
                format!(".{lowered}")
            };
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.rag.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.rag.chunk_overlap < self.rag.chunk_size,
            "chunk_overlap must be smaller than chunk_size"
        );
        anyhow::ensure!(self.rag.max_workers > 0, "max_workers must be positive");
        anyhow::ensure!(self.rag.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.openai.embedding_dim > 0,
            "embedding_dim must be positive"
        );
        anyhow::ensure!(
            !self.files.supported_extensions.is_empty(),
            "at least one supported file extension must be specified"
        );
        anyhow::ensure!(
            self.performance.retry_backoff_factor >= 1.0,
            "retry_backoff_factor must be at least 1.0"
        );
        Ok(())
    }

    /// OpenAI connection parameters; the key itself is never included.
    #[must_use]
    pub fn openai_config(&self) -> serde_json::Value {
        json!({
            "base_url": self.openai.base_url,
            "llm_model": self.openai.llm_model,
            "vision_model": self.openai.vision_model,
            "embedding_model": self.openai.embedding_model,
            "embedding_dim": self.openai.embedding_dim,
            "api_key_configured": !self.openai.api_key.is_empty(),
        })
    }

    #[must_use]
    pub fn rag_config(&self) -> serde_json::Value {
        json!({
            "provider": self.rag.provider,
            "working_dir": self.rag.working_dir.display().to_string(),
            "chunk_size": self.rag.chunk_size,
            "chunk_overlap": self.rag.chunk_overlap,
            "max_workers": self.rag.max_workers,
            "enable_image": self.multimodal.enable_image,
            "enable_table": self.multimodal.enable_table,
            "enable_equation": self.multimodal.enable_equation,
        })
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// `DEBUG=true` forces debug output regardless of `LOG_LEVEL`.
    #[must_use]
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.logging.level
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{key} must be a boolean, got {other}"),
    }
}

fn parse_num<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value: {value}"))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_with(vars: &[(&str, &str)]) -> Result<Settings> {
        let temp = tempfile::tempdir().unwrap();
        let work = temp.path().join("rag").to_string_lossy().to_string();
        let mut map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.entry("RAG_WORKING_DIR".to_string()).or_insert(work);
        let result = Settings::from_lookup(|k| map.get(k).cloned());
        drop(temp);
        result
    }

    #[test]
    fn test_default_settings() {
        let settings = settings_with(&[("OPENAI_API_KEY", "test-key")]).unwrap();
        assert_eq!(settings.app_name, "rag-anything-mcp");
        assert_eq!(settings.environment, "production");
        assert_eq!(settings.logging.level, "INFO");
        assert_eq!(settings.openai.api_key, "test-key");
        assert_eq!(settings.rag.chunk_size, 512);
        assert_eq!(settings.rag.chunk_overlap, 50);
        assert_eq!(settings.rag.max_workers, 4);
        assert_eq!(settings.files.max_file_size_mb, 100);
        assert_eq!(settings.rag.provider, Provider::Openai);
    }

    #[test]
    fn test_environment_validation() {
        for env in ["development", "staging", "production", "Staging"] {
            let settings = settings_with(&[("ENVIRONMENT", env)]).unwrap();
            assert_eq!(settings.environment, env.to_lowercase());
        }
        assert!(settings_with(&[("ENVIRONMENT", "invalid")]).is_err());
    }

    #[test]
    fn test_log_level_validation() {
        for level in ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "debug"] {
            let settings = settings_with(&[("LOG_LEVEL", level)]).unwrap();
            assert_eq!(settings.logging.level, level.to_uppercase());
        }
        assert!(settings_with(&[("LOG_LEVEL", "INVALID")]).is_err());
    }

    #[test]
    fn test_working_directory_created() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("rag");
        let dir_str = dir.to_string_lossy().to_string();
        let settings =
            Settings::from_lookup(|k| (k == "RAG_WORKING_DIR").then(|| dir_str.clone())).unwrap();
        assert!(settings.rag.working_dir.is_dir());
    }

    #[test]
    fn test_openai_config_hides_key() {
        let settings = settings_with(&[("OPENAI_API_KEY", "sk-secret")]).unwrap();
        let cfg = settings.openai_config();
        assert_eq!(cfg["base_url"], "https://api.openai.com/v1");
        assert_eq!(cfg["llm_model"], "gpt-4o-mini");
        assert_eq!(cfg["vision_model"], "gpt-4o");
        assert_eq!(cfg["api_key_configured"], true);
        assert!(!cfg.to_string().contains("sk-secret"));
    }

    #[test]
    fn test_rag_config() {
        let settings = settings_with(&[]).unwrap();
        let cfg = settings.rag_config();
        assert_eq!(cfg["chunk_size"], 512);
        assert_eq!(cfg["chunk_overlap"], 50);
        assert_eq!(cfg["max_workers"], 4);
    }

    #[test]
    fn test_environment_helpers_and_debug() {
        let prod = settings_with(&[]).unwrap();
        assert!(prod.is_production());
        assert!(!prod.is_development());
        assert_eq!(prod.effective_log_level(), "INFO");

        let dev = settings_with(&[("ENVIRONMENT", "development"), ("DEBUG", "true")]).unwrap();
        assert!(dev.is_development());
        assert_eq!(dev.effective_log_level(), "DEBUG");
    }

    #[test]
    fn test_extension_list_normalized() {
        let settings = settings_with(&[("SUPPORTED_FILE_EXTENSIONS", "PDF, .txt,md")]).unwrap();
        assert_eq!(settings.files.supported_extensions, vec![".pdf", ".txt", ".md"]);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(settings_with(&[("RAG_MAX_WORKERS", "0")]).is_err());
        assert!(settings_with(&[("RAG_MAX_WORKERS", "many")]).is_err());
        assert!(settings_with(&[("RAG_CHUNK_OVERLAP", "600")]).is_err());
        assert!(settings_with(&[("DEBUG", "maybe")]).is_err());
    }

    #[test]
    fn test_load_from_json_with_defaults() {
        let json = r#"{"rag": {"chunk_size": 1000}, "environment": "staging"}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.rag.chunk_size, 1000);
        assert_eq!(settings.rag.chunk_overlap, 50);
        assert_eq!(settings.environment, "staging");
        assert_eq!(settings.cache.ttl_secs, 3600);
    }

    #[test]
    fn test_provider_override() {
        let settings = settings_with(&[("RAG_PROVIDER", "local")]).unwrap();
        assert_eq!(settings.rag.provider, Provider::Local);
        assert!(settings_with(&[("RAG_PROVIDER", "anthropic")]).is_err());
    }
}
