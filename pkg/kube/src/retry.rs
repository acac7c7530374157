//! Exponential backoff for API requests.

use pkg_constants::network::{
    API_RETRY_INITIAL_BACKOFF_MS, API_RETRY_MAX_BACKOFF_MS, API_RETRY_TIMES,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: API_RETRY_TIMES,
            initial_backoff: Duration::from_millis(API_RETRY_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(API_RETRY_MAX_BACKOFF_MS),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps; used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error,
/// or the policy runs out of retries.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    debug!(operation = operation_name, retry, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if should_retry(&err) && retry < policy.max_retries => {
                let backoff = policy.backoff(retry);
                warn!(
                    operation = operation_name,
                    retry = retry + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
