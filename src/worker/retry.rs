//! Bounded retry with a fixed backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Retry policy for one unreliable operation
///
/// Every error is retried the same way: a timeout and an HTTP 404 both
/// cost an attempt and a backoff. No sleep follows the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Final result of a retried operation
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. On exhaustion the last
    /// error is returned.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Attempted<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempts = attempt, "Succeeded after retry");
                    }
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(label, attempts = attempt, error = %e, "Giving up after retries");
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!(label, attempt, error = %e, "Attempt failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }
}
