//! Bounded retry with increasing backoff.
//!
//! Every network call the middleware makes to the facilitator is wrapped in a
//! [`RetryPolicy`]. Only transient failures (timeouts, connection errors) are
//! retried; a well-formed negative answer is definitive and is returned to
//! the caller immediately, since retrying a deterministic rejection cannot
//! change the outcome.

use std::future::Future;
use std::time::Duration;

/// Classifies errors into transient (retryable) and definite.
pub trait TransientError {
    /// Whether retrying the failed operation could plausibly succeed.
    fn is_transient(&self) -> bool;
}

/// Bounded retry with linearly increasing backoff.
///
/// Attempt `n` (1-based) that fails transiently sleeps `base_delay * n`
/// before the next try. The final attempt's error is returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Backoff unit; attempt `n` waits `base_delay * n` before retrying.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` until it succeeds, fails definitively, or the attempt
    /// budget is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the last error observed, transient or not.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: TransientError + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.base_delay * attempt;
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient facilitator failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
