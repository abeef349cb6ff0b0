//! Retry utilities: backoff builders for transient storage failures.
//!
//! Uses `backon` for exponential backoff with jitter. The ledger operations
//! themselves never retry; callers opt in by wrapping a whole operation.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::interfaces::{PersistenceError, Result};

/// Standard backoff for re-running a ledger operation.
///
/// - Min delay: 10ms
/// - Max delay: 2s
/// - Max attempts: 5
/// - Jitter enabled
pub fn ledger_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(5)
        .with_jitter()
}

/// Re-run `operation` while it fails with a retryable [`PersistenceError`].
///
/// Each attempt calls `operation` again, so every ledger operation gets a
/// fresh transaction. Non-retryable errors are returned immediately.
pub async fn retry_transient<T, F, Fut>(backoff: ExponentialBuilder, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    operation
        .retry(backoff)
        .when(PersistenceError::is_retryable)
        .notify(|err: &PersistenceError, delay: Duration| {
            warn!(error = %err, delay = ?delay, "Transient ledger failure, retrying");
        })
        .await
}
