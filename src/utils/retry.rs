/// Retry with exponential backoff and optional jitter.
///
/// Used around outbound API calls (embeddings, chat completions).
use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::PerformanceSettings;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2.0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_settings(perf: &PerformanceSettings) -> Self {
        Self {
            max_retries: perf.max_retries,
            backoff_factor: perf.retry_backoff_factor,
            ..Self::default()
        }
    }

    /// Delay to wait after a failure, given the delay used before it.
    fn next_delay(&self, previous: Duration) -> Duration {
        let grown = previous.mul_f64(self.backoff_factor).min(self.max_delay);
        if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            grown.mul_f64(factor)
        } else {
            grown
        }
    }

    /// Run `operation` until it succeeds or `max_retries` extra attempts
    /// have failed; the last error is returned.
    pub async fn retry<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.retry_if(operation, |_| true).await
    }

    /// Like [`retry`](Self::retry), but stops early when `should_retry`
    /// returns `false` for an error.
    pub async fn retry_if<F, Fut, T, E, P>(&self, mut operation: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= self.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    attempt += 1;
                    delay = self.next_delay(delay);
                    tracing::debug!(
                        "Operation failed (attempt {attempt}), retrying in {}ms: {e}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Failure of an outbound HTTP call, classified for [`RetryPolicy::retry_if`].
#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    /// Rate limits and server errors are worth retrying; other statuses are not.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        Self {
            message: format!("API error {status}: {body}"),
            retryable: status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error(),
        }
    }

    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            retryable: e.is_timeout() || e.is_connect() || e.is_request(),
            message: if e.is_timeout() {
                format!("request timed out: {e}")
            } else {
                format!("HTTP request failed: {e}")
            },
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
