//! # Lock-Conflict Retry
//!
//! Engine operations run inside one transaction. When SQLite reports the
//! database as busy past `busy_timeout`, the whole transaction is rolled back
//! and run again from the start after an exponential backoff.
//!
//! ```text
//! attempt 1 ──► Busy ──► wait ~initial ──► attempt 2 ──► Busy ──► wait ~2×
//!     ...
//! attempt N ──► Busy ──► DbError::ConcurrencyConflict { operation, attempts: N }
//!
//! Any other error (validation, conflict, not found) is returned at once.
//! ```

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// How often and how patiently a busy transaction is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        RetryPolicy::new(1, Duration::ZERO, Duration::ZERO)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs `op` until it succeeds, fails with a non-busy error, or the
    /// attempt budget is spent.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut op: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_busy() => {
                    if attempt >= self.max_attempts {
                        warn!(operation, attempts = attempt, "Retries exhausted");
                        return Err(DbError::ConcurrencyConflict {
                            operation: operation.to_string(),
                            attempts: attempt,
                        });
                    }
                    let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
                    warn!(operation, attempt, ?delay, error = %err, "Database busy, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[test]
    fn test_new_clamps() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10), Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_backoff, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_retries_busy_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast(3)
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DbError::Busy("database is locked".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_concurrency_conflict() {
        let calls = AtomicU32::new(0);
        let result: DbResult<()> = fast(2)
            .run("register", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DbError::Busy("database is locked".to_string())) }
            })
            .await;

        assert!(matches!(
            result,
            Err(DbError::ConcurrencyConflict { attempts: 2, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: DbResult<()> = fast(5)
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DbError::not_found("Order", "missing")) }
            })
            .await;

        assert!(matches!(result, Err(DbError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
