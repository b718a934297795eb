use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; values below 1 are raised to 1.
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_millis(max_attempts: usize, delay_ms: u64) -> Self {
        Self::new(max_attempts, Duration::from_millis(delay_ms))
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn with_max_attempts(self, max_attempts: usize) -> Self {
        Self::new(max_attempts, self.delay)
    }

    /// Run `f` until it succeeds or attempts run out, returning the last error.
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;

        loop {
            match f(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            operation = operation_name,
                            attempts = attempt,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Operation failed after max attempts"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );

                    sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`retry`](Self::retry) but degrades to `fallback` once attempts run out.
    pub async fn retry_or<F, Fut, T, E>(&self, operation_name: &str, fallback: T, f: F) -> T
    where
        F: FnMut(usize) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match self.retry(operation_name, f).await {
            Ok(value) => value,
            Err(_) => {
                warn!(operation = operation_name, "All attempts failed, using fallback value");
                fallback
            }
        }
    }
}
