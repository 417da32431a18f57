//! Retry utilities with exponential backoff and jitter.
//!
//! Only the `aws-auth` role mapping upsert is retried. Every other provider or
//! API call in this crate is attempted once and its error reported as is.
//!
//! # Example
//!
//! ```ignore
//! use ocm_trust::retry::{retry_with_backoff, RetryConfig};
//!
//! let result = retry_with_backoff(
//!     &RetryConfig::role_mapping(),
//!     "upsert aws-auth",
//!     |e: &Error| !e.is_not_found(),
//!     || async { mapper.try_upsert(&arn, &groups).await },
//! ).await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Backoff configuration for a retried operation
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::role_mapping()
    }
}

impl RetryConfig {
    /// Policy for the `aws-auth` upsert: 12 attempts between 100ms and 30s
    pub fn role_mapping() -> Self {
        Self {
            max_attempts: 12,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Same delays, different attempt budget
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            ..Self::role_mapping()
        }
    }
}

/// Execute an async operation with exponential backoff and jitter.
///
/// Errors for which `is_retryable` returns false are returned immediately.
/// Otherwise the operation is retried until it succeeds or `max_attempts`
/// is exhausted, in which case the last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }
                if attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                // Jitter: 0.5x to 1.5x, never above max_delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * jitter).min(config.max_delay.as_secs_f64()),
                );

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = jittered_delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(jittered_delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}
