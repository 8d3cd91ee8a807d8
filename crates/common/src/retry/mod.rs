//! Rate-limit aware retry for provider calls
//!
//! Only `AppError::ProviderRateLimited` is retried. Every other error class
//! is returned to the caller on the first failure. Delays grow
//! exponentially from the base delay (1000ms, 2000ms, ...) without jitter.

use crate::config::RetryConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry budget applied to rate-limited provider calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(300))
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Run `op`, retrying rate-limit failures within the policy's budget.
///
/// `operation` labels log lines and the retry counter.
pub async fn retry_on_rate_limit<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    backoff::future::retry_notify(
        policy.backoff(),
        || {
            attempt += 1;
            let current = attempt;
            let call = op();
            async move {
                call.await.map_err(|e| {
                    if e.is_rate_limited() && current < max_attempts {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |err: AppError, delay: Duration| {
            metrics::record_retry(operation);
            warn!(
                operation = operation,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Provider rate limited, backing off"
            );
        },
    )
    .await
}
