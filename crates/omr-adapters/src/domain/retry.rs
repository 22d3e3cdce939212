//! Uniform retry/backoff/rate-limit envelope shared by every adapter.
//!
//! Mirrors the attempt-counting circuit-breaker discipline used elsewhere
//! in this codebase for bounded retry loops: attempts are capped, and the
//! loop gives up deterministically rather than spinning forever.

use std::time::Duration;

use shared_types::{GatewayError, RateLimiter};
use tracing::warn;

/// Retry policy for a single adapter call.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Total wall-clock budget across all attempts and backoff waits.
    pub total_budget: Duration,
    /// Backoff after the first failed attempt; doubles each subsequent retry.
    pub initial_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            total_budget: Duration::from_secs(90),
            initial_backoff: Duration::from_millis(200),
        }
    }
}

/// Run `call` under `config`'s retry policy, gated by `limiter`.
///
/// `Transient` and `Timeout` failures are retried with exponential
/// backoff until `max_attempts` or `total_budget` is exhausted, at which
/// point the last error is returned. `Permanent` failures are never
/// retried.
pub async fn with_retry<F, Fut, T>(
    adapter: &'static str,
    limiter: &RateLimiter,
    config: &RetryConfig,
    call: F,
) -> Result<T, GatewayError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, GatewayError>>,
{
    let started = tokio::time::Instant::now();
    let mut backoff = config.initial_backoff;
    let mut last_err = GatewayError::Transient {
        adapter: adapter.to_string(),
        message: "no attempts made".to_string(),
    };

    for attempt in 1..=config.max_attempts {
        limiter.acquire().await;

        let outcome = tokio::time::timeout(config.request_timeout, call()).await;

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(GatewayError::Permanent { adapter, message })) => {
                return Err(GatewayError::Permanent { adapter, message });
            }
            Ok(Err(err)) => err,
            Err(_) => GatewayError::Timeout {
                adapter: adapter.to_string(),
                elapsed_ms: config.request_timeout.as_millis() as u64,
            },
        };

        warn!(adapter, attempt, error = %err, "adapter call failed, considering retry");
        last_err = err;

        if attempt == config.max_attempts || started.elapsed() + backoff >= config.total_budget {
            break;
        }
        tokio::time::sleep(backoff).await;
        backoff *= 2;
    }

    Err(last_err)
}
