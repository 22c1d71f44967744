//! Structured logging with tracing.
//!
//! Output goes to stderr: stdout is reserved for MCP frames.

use std::path::Path;

use anyhow::{Result, bail};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, Settings};

/// Crates whose debug output drowns out ours.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Map a configured level name to a tracing level.
///
/// Accepts the level names used in settings (`WARNING`, `CRITICAL`) as well
/// as tracing's own.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "critical" => Ok(Level::ERROR),
        other => bail!("invalid log level '{other}'"),
    }
}

fn build_filter(level: Level) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let mut directives = level.to_string().to_lowercase();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    EnvFilter::new(directives)
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let level = parse_log_level(settings.effective_log_level())?;
    let filter = build_filter(level);

    let (file_writer, guard) = match settings.logging.file_path.as_deref() {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let prefix = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "rag-anything-mcp.log".to_string());
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = Registry::default().with(filter);
    match settings.logging.format {
        LogFormat::Json => {
            let stderr = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            let file = file_writer.map(|w| {
                fmt::layer()
                    .json()
                    .with_writer(w)
                    .with_ansi(false)
                    .with_target(true)
            });
            registry.with(stderr).with(file).try_init()?;
        }
        LogFormat::Text => {
            let stderr = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true);
            let file = file_writer.map(|w| {
                fmt::layer()
                    .with_writer(w)
                    .with_ansi(false)
                    .with_target(true)
            });
            registry.with(stderr).with(file).try_init()?;
        }
    }

    tracing::info!("Logging initialized with level: {level}");
    Ok(guard)
}
