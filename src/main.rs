use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rag_anything_mcp::config::{Provider, Settings};
use rag_anything_mcp::mcp::McpServer;
use rag_anything_mcp::services::RagManager;
use rag_anything_mcp::telemetry::{MetricsCollector, logging};
use rag_anything_mcp::utils::files::ensure_directory;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Instances idle for less than this are never swept.
const MIN_INSTANCE_TTL_SECS: u64 = 60;

/// Upper bound on how often idle instances are swept.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(
    name = "rag-anything-mcp",
    version,
    about = "Multimodal RAG over local directories, served via MCP"
)]
struct Cli {
    /// JSON configuration file (environment variables override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for per-directory RAG storage
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long)]
    log_level: Option<String>,
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(dir) = &cli.working_dir {
        ensure_directory(dir)
            .with_context(|| format!("failed to create working directory: {}", dir.display()))?;
        settings.rag.working_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        logging::parse_log_level(level)?;
        settings.logging.level = level.to_uppercase();
    }
    Ok(settings)
}

async fn run(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    let metrics = MetricsCollector::shared(settings.metrics_enabled);
    let manager = Arc::new(RagManager::new(settings.clone(), metrics.clone()));

    info!(
        app = %settings.app_name,
        version = %settings.version,
        environment = %settings.environment,
        provider = ?settings.rag.provider,
        working_dir = %settings.rag.working_dir.display(),
        "Starting RAG Anything MCP server"
    );
    debug!(
        openai = %settings.openai_config(),
        rag = %settings.rag_config(),
        "Effective configuration"
    );
    if !settings.is_production()
        && settings.rag.provider == Provider::Openai
        && settings.openai.api_key.is_empty()
    {
        warn!("OPENAI_API_KEY is not set; tools must be called with an api_key");
    }

    let ttl = Duration::from_secs(settings.cache.ttl_secs.max(MIN_INSTANCE_TTL_SECS));
    let interval = ttl.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
    let token = CancellationToken::new();
    let sweeper = manager.spawn_cleanup_task(interval, ttl, token.clone());

    let server = McpServer::new(manager.clone());
    let outcome = tokio::select! {
        result = server.start() => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            Ok(())
        }
    };

    token.cancel();
    if let Err(e) = sweeper.await {
        warn!("Cleanup task ended abnormally: {e}");
    }
    manager.cleanup().await;
    let snapshot = metrics.flush();
    if settings.is_development() {
        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!(metrics = %json, "Final metrics"),
            Err(e) => warn!("Failed to serialize metrics: {e}"),
        }
    }
    info!(counters = snapshot.counters.len(), "Metrics flushed");
    info!("Server shutdown complete");

    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init_logging(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
