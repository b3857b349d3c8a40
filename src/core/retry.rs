//! Retry with exponential backoff.
//!
//! Only plan generation retries; vendor publish calls fail the run on the
//! first error.

use std::future::Future;
use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::planner(3)
    }
}

impl RetryConfig {
    /// Retry settings for calls to the planning model.
    pub fn planner(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
            backoff_multiplier: 2.0,
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self { max_attempts: 1, initial_delay: Duration::ZERO, ..Self::planner(1) }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped as u64)
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result (success, or the last error).
    pub result: Result<T, E>,

    /// Number of attempts made.
    pub attempts: u32,

    /// Time spent including delays.
    pub elapsed: Duration,
}

/// Run an async operation until it succeeds or attempts are exhausted.
///
/// The closure receives the 1-based attempt number.
pub async fn retry_async<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = operation(attempt).await;

        match result {
            Ok(value) => {
                return RetryOutcome { result: Ok(value), attempts: attempt, elapsed: start.elapsed() }
            }
            Err(e) if attempt >= config.max_attempts => {
                return RetryOutcome { result: Err(e), attempts: attempt, elapsed: start.elapsed() }
            }
            Err(e) => {
                let delay = config.delay_after(attempt);
                tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
