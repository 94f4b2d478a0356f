//! Retry with exponential backoff for outbound API calls.

use std::future::Future;
use std::time::Duration;

use crate::constants::{AI_MAX_RETRIES, AI_RETRY_INITIAL_MS, AI_RETRY_MAX_SECS};

/// Errors that know whether trying again could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: AI_MAX_RETRIES,
            initial_delay: Duration::from_millis(AI_RETRY_INITIAL_MS),
            max_delay: Duration::from_secs(AI_RETRY_MAX_SECS),
        }
    }
}

impl RetryConfig {
    /// Default backoff with a custom retry count.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// Only errors reporting [`Retryable::is_retryable`] are retried; the delay
/// doubles after each failure up to `config.max_delay`. `label` names the
/// operation in log output.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                attempts += 1;
                if attempts > config.max_retries {
                    return Err(e);
                }

                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    label,
                    attempts,
                    config.max_retries + 1,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.max_delay);
            }
        }
    }
}
