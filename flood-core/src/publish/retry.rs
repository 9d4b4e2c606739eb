use crate::error::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff for transient remote failures.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled after every failure.
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1000,
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or the policy is
/// exhausted. Only errors reporting [`is_transient`](crate::FloodError::is_transient)
/// are retried.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_tries = policy.max_attempts.max(1);
    let mut sleep_millis = policy.initial_backoff_ms;
    let mut tries = 1;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && tries < max_tries => {
                warn!("Attempt {}/{}: {} failed: {}", tries, max_tries, operation, e);
                info!(
                    "Sleeping for {} milliseconds before retry of {}",
                    sleep_millis, operation
                );
                tokio::time::sleep(Duration::from_millis(sleep_millis)).await;
                sleep_millis = sleep_millis.saturating_mul(2);
                tries += 1;
            }
            Err(e) => {
                if tries > 1 {
                    warn!("All {} attempts of {} failed", tries, operation);
                }
                return Err(e);
            }
        }
    }
}
