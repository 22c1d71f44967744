//! Logging setup and in-process metrics.

pub mod logging;
pub mod metrics;

pub use self::metrics::{MetricsCollector, TimerGuard};
