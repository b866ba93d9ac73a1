//! Retry with backoff.
//!
//! One helper shared by seek verification and interrupted `play()` calls.
//! Every attempt and every backoff delay races a cancellation token, so a
//! retry loop never outlives the session it belongs to.

use core_async::sync::CancellationToken;
use core_async::time::{sleep_or_cancel, until_cancelled};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// A fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            use_exponential_backoff: false,
        }
    }

    /// Delay after the failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }
}

/// Why [`retry_with_backoff`] gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; `last` is the final one.
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with an error that must not be retried.
    Aborted(E),
    /// The token was cancelled.
    Cancelled,
}

impl<E> RetryError<E> {
    /// The underlying error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Aborted(error) => Some(error),
            RetryError::Cancelled => None,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// runs out of attempts or `token` is cancelled.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, Op, Fut, R>(
    policy: RetryPolicy,
    token: &CancellationToken,
    is_retryable: R,
    mut operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match until_cancelled(token, operation(attempt)).await {
            None => return Err(RetryError::Cancelled),
            Some(Ok(value)) => return Ok(value),
            Some(Err(error)) => error,
        };

        if !is_retryable(&error) {
            return Err(RetryError::Aborted(error));
        }

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );

        if !sleep_or_cancel(token, delay).await {
            return Err(RetryError::Cancelled);
        }
    }
}
