//! Retry logic with growing backoff for transient errors.

use crate::error::{Error, ExecutorError};
use crate::types::RetryPolicy;
use std::fmt;
use std::thread;
use std::time::Duration;

/// Errors that know whether another attempt could help.
pub trait Retryable {
    /// Whether the failure is transient.
    fn is_retryable(&self) -> bool;
}

impl Retryable for ExecutorError {
    fn is_retryable(&self) -> bool {
        ExecutorError::is_retryable(self)
    }
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        Error::is_retryable(self)
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback: Send + Sync {
    /// Called when an operation is about to be retried.
    ///
    /// # Arguments
    /// * `attempt` - The attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay` - Time until the next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &dyn fmt::Display, delay: Duration);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &dyn fmt::Display, _delay: Duration) {}
}

/// Callback that logs retry information at warn level.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &dyn fmt::Display, delay: Duration) {
        log::warn!(
            "Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {}s...",
            delay.as_secs()
        );
    }
}

/// A value (or error) together with the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    /// Result of the final attempt
    pub value: T,
    /// Attempts made, at least 1
    pub attempts: u32,
}

/// Execute an operation with retry logic.
///
/// The first attempt runs immediately. A retryable failure with attempts
/// left sleeps for [`RetryPolicy::delay_for_attempt`] and tries again; a
/// terminal failure returns at once without consuming the remaining
/// attempts. When attempts run out the last failure is returned with the
/// total attempt count.
pub fn with_retry<T, E, F>(
    policy: &RetryPolicy,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<Attempted<T>, Attempted<E>>
where
    E: Retryable + fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation() {
            Ok(value) => return Ok(Attempted { value, attempts: attempt }),
            Err(e) => {
                if !e.is_retryable() || attempt >= max_attempts {
                    return Err(Attempted { value: e, attempts: attempt });
                }

                let delay = policy.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt, max_attempts, &e, delay);
                }

                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
