use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded retry with optional exponential backoff.
///
/// Never makes more than `max_attempts` calls, stops at the first success and
/// returns the last attempt's error otherwise. The wrapped operation must be safe
/// to repeat; that is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff = base;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Giving up after exhausting retries"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed. Retrying in {:?}",
                        delay
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}
