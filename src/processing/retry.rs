//! Bounded retry with a fixed backoff between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first; never below one.
    pub max_attempts: u32,
    /// Pause after each failed attempt that will be retried.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Build a policy, clamping `max_attempts` to at least one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// The closure receives the 1-based attempt number. The error of the final attempt is
/// returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts => {
                tracing::debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "Attempt failed; retrying after backoff"
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
