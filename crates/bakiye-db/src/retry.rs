//! # Conflict Retry
//!
//! Bounded exponential backoff around a unit of work that may lose a
//! compare-and-swap or find SQLite busy.
//!
//! ```text
//! attempt 1 ──► ConcurrentModification ──► sleep ~5ms
//! attempt 2 ──► Busy                    ──► sleep ~10ms
//! attempt 3 ──► Ok(entry)
//!
//! attempt == max_attempts ──► last error is returned as-is
//! any non-retryable error ──► returned immediately
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DbResult;

/// Retry bounds for ledger work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Default: 8
    pub max_attempts: u32,
    /// First sleep. Default: 5ms
    pub initial_interval: Duration,
    /// Cap on a single sleep. Default: 250ms
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
pub async fn retry_on_conflict<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff.next_backoff().unwrap_or(policy.max_interval);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    ?delay,
                    error = %e,
                    "Retrying after conflict"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(operation, attempt, error = %e, "Retry budget exhausted");
                }
                return Err(e);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
