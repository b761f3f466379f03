//! Write transactions and lock-contention retry
//!
//! Write paths open their transaction with `BEGIN IMMEDIATE`, so concurrent
//! writers queue on the busy timeout instead of failing a deferred
//! read-to-write lock upgrade with SQLITE_BUSY.

use std::future::Future;
use std::time::{Duration, Instant};

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, error, warn};

use crate::Result;

/// Default total time `retry_on_lock` keeps retrying
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 10_000;

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// Begin a transaction that holds the write lock from its first statement
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Run `operation` until it stops failing on lock contention or
/// `max_wait_ms` has elapsed
///
/// Backoff starts at 10ms and doubles up to 1s. Errors other than lock
/// contention are returned immediately. `operation` must be safe to run
/// again, i.e. each attempt owns its own transaction.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_lock_contention() => return Err(err),
            Err(err) => {
                let elapsed = start.elapsed();
                if elapsed >= max_duration {
                    error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    error = %err,
                    "Database locked, will retry after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}
