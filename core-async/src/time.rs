//! Time-related abstractions.
//!
//! - On native platforms: `tokio::time`. `Instant` is Tokio's instant so that
//!   tests running with a paused clock observe virtual time everywhere.
//! - On WASM: `gloo-timers` for sleeping and `performance.now()` for `Instant`.
//!
//! Both targets expose the same `timeout` signature and `TimeoutError`.

use crate::sync::CancellationToken;
use futures::future::{select, Either};
use std::future::Future;

pub use std::time::Duration;

/// Error returned when a timeout expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError;

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

// ============================================================================
// Native Implementation (Tokio)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::{sleep, Instant};

/// Requires a future to complete before `duration` has elapsed.
#[cfg(not(target_arch = "wasm32"))]
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError)
}

// ============================================================================
// WASM Implementation
// ============================================================================

/// Longest delay a single `setTimeout` honours.
#[cfg(target_arch = "wasm32")]
const MAX_TIMER_DELAY: Duration = Duration::from_millis(i32::MAX as u64);

/// Sleeps for the specified duration using the browser's `setTimeout`.
///
/// Longer sleeps are split into several timers.
#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    let mut remaining = duration;
    while remaining > MAX_TIMER_DELAY {
        gloo_timers::future::sleep(MAX_TIMER_DELAY).await;
        remaining -= MAX_TIMER_DELAY;
    }
    gloo_timers::future::sleep(remaining).await
}

/// Requires a future to complete before `duration` has elapsed.
#[cfg(target_arch = "wasm32")]
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    let sleep_fut = sleep(duration);
    futures::pin_mut!(future);
    futures::pin_mut!(sleep_fut);

    match select(future, sleep_fut).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(_) => Err(TimeoutError),
    }
}

/// A monotonic instant backed by `performance.now()`.
///
/// Readings are relative to page load. When the performance API is missing
/// (workers without a window) every reading is zero, which only degrades
/// heartbeat and rate-limit precision.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Instant {
    millis: f64,
}

#[cfg(target_arch = "wasm32")]
impl Instant {
    pub fn now() -> Self {
        let millis = web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now())
            .unwrap_or(0.0);
        Self { millis }
    }

    pub fn elapsed(&self) -> Duration {
        Self::now().saturating_duration_since(*self)
    }

    /// Returns the duration since `earlier`, or zero if `earlier` is later.
    pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        let delta = (self.millis - earlier.millis).max(0.0);
        Duration::from_secs_f64(delta / 1000.0)
    }

    pub fn duration_since(&self, earlier: Instant) -> Duration {
        self.saturating_duration_since(earlier)
    }
}

#[cfg(target_arch = "wasm32")]
impl std::ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Self::Output {
        Instant {
            millis: self.millis + duration.as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl std::ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, other: Instant) -> Self::Output {
        self.saturating_duration_since(other)
    }
}

// ============================================================================
// Cancellation-aware helpers
// ============================================================================

/// Sleeps for `duration` unless `token` is cancelled first.
///
/// Returns `true` when the full duration elapsed and `false` when the sleep
/// was cut short by cancellation. Every engine timer goes through this so a
/// timer can never fire against a session that has already been torn down.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    until_cancelled(token, sleep(duration)).await.is_some()
}

/// Drives `future` to completion unless `token` is cancelled first.
pub async fn until_cancelled<F>(token: &CancellationToken, future: F) -> Option<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return None;
    }

    let cancelled = token.cancelled();
    futures::pin_mut!(future);
    futures::pin_mut!(cancelled);

    match select(future, cancelled).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(_) => None,
    }
}
