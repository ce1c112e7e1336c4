//! Exponential back-off for transient generation failures.

use std::future::Future;
use std::time::Duration;

use pipeline::{GenerationError, RetryPolicy};
use tracing::warn;

/// Retry schedule: `initial`, doubled per retry, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max_delay: Duration,
    /// Total attempts, including the first. Never below one.
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

impl Backoff {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max_delay)
    }

    /// Worst-case duration of [`Backoff::run`] when each attempt is bounded
    /// by `per_attempt`. Server-requested delays are not included.
    pub fn budget(&self, per_attempt: Duration) -> Duration {
        (1..self.max_attempts).fold(
            per_attempt.saturating_mul(self.max_attempts),
            |total, retry| total.saturating_add(self.delay(retry)),
        )
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts run
    /// out. Only errors whose [`RetryPolicy`] is retryable are retried.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let after = match err.retry_policy() {
                RetryPolicy::Retryable { after } if attempt < self.max_attempts => after,
                _ => return Err(err),
            };
            let delay = after.map_or(self.delay(attempt), |a| a.max(self.delay(attempt)));
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Generation failed, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
