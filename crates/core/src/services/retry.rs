//! Optimistic-lock retry combinators.
//!
//! A read-modify-write unit of work that loses a version race is simply
//! re-executed from a fresh read. The unit must be safely re-executable,
//! which the engine's pure-fold contracts already guarantee.

use std::future::Future;

use tracing::trace;

use crate::metrics::record_optimistic_retry;

/// Re-execute a unit of work until it stops failing with a version conflict.
///
/// Retries are unbounded: the unit is assumed idempotent and cheap relative
/// to conflict probability. Callers that need a bound use
/// [`optimistic_retry_bounded`].
pub async fn optimistic_retry<T, E, F, Fut, P>(mut unit: F, is_conflict: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    loop {
        match unit().await {
            Err(error) if is_conflict(&error) => {
                record_optimistic_retry();
                trace!("Version conflict, re-executing unit of work");
            }
            other => return other,
        }
    }
}

/// Like [`optimistic_retry`], but gives up after `max_attempts` executions
/// and returns the last conflict error.
pub async fn optimistic_retry_bounded<T, E, F, Fut, P>(
    mut unit: F,
    is_conflict: P,
    max_attempts: usize,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match unit().await {
            Err(error) if is_conflict(&error) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(error);
                }
                record_optimistic_retry();
                trace!(attempt, "Version conflict, re-executing unit of work");
            }
            other => return other,
        }
    }
}
