//! # Readiness & Pending-Operation Coordinator
//!
//! Commands that arrive before the element can act on them are buffered and
//! replayed once it becomes ready.
//!
//! ## Rules
//!
//! - At most one pending seek (last write wins) and one pending play flag.
//! - The pending seek is flushed and awaited before the pending play.
//! - Pending operations never outlive their source.
//! - A seek within the de-duplication window of the previous applied target
//!   is dropped; `seek_dedupe_interval` optionally bounds how long that
//!   target is remembered.
//! - Too many native seeks in a short window trip the loop breaker; further
//!   seeks are dropped until the window drains.
//! - While recovery runs, commands wait for it to settle.

use crate::adapter::MediaAdapter;
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::recovery::RecoveryStatus;
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};
use bridge_traits::SourceId;
use core_async::sync::watch;
use core_async::time::{until_cancelled, Instant};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Readiness of the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NotReady,
    /// Ready event seen, pending operations are being replayed.
    Flushing,
    Ready,
}

/// Operations buffered until the source is ready.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingOperation {
    pub seek: Option<f64>,
    pub play: bool,
}

impl PendingOperation {
    pub fn is_empty(&self) -> bool {
        self.seek.is_none() && !self.play
    }
}

/// What happened to a seek request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    /// The element was moved to this position.
    Applied(f64),
    /// Buffered until the source is ready.
    Deferred,
    /// Too close to the previous target.
    Deduplicated,
    /// Dropped by the rapid-seek loop breaker.
    Throttled,
}

struct CoordinatorState {
    source: Option<SourceId>,
    readiness: Readiness,
    pending: PendingOperation,
    last_applied_seek: Option<(f64, Instant)>,
    recent_seek_timestamps: VecDeque<Instant>,
}

impl CoordinatorState {
    fn new(source: Option<SourceId>) -> Self {
        Self {
            source,
            readiness: Readiness::NotReady,
            pending: PendingOperation::default(),
            last_applied_seek: None,
            recent_seek_timestamps: VecDeque::new(),
        }
    }

    fn buffers(&self) -> bool {
        self.readiness != Readiness::Ready
    }
}

pub struct ReadinessCoordinator {
    adapter: Arc<MediaAdapter>,
    recovery: watch::Receiver<RecoveryStatus>,
    config: Arc<PlayerConfig>,
    state: Mutex<CoordinatorState>,
}

impl ReadinessCoordinator {
    pub fn new(
        adapter: Arc<MediaAdapter>,
        recovery: watch::Receiver<RecoveryStatus>,
        config: Arc<PlayerConfig>,
    ) -> Self {
        Self {
            adapter,
            recovery,
            config,
            state: Mutex::new(CoordinatorState::new(None)),
        }
    }

    /// Starts over for a new source; anything pending is discarded.
    pub fn reset(&self, source: SourceId) {
        let mut state = self.state.lock();
        if !state.pending.is_empty() {
            debug!(pending = ?state.pending, "Discarding operations of the previous source");
        }
        *state = CoordinatorState::new(Some(source));
    }

    pub fn readiness(&self) -> Readiness {
        self.state.lock().readiness
    }

    pub fn pending(&self) -> PendingOperation {
        self.state.lock().pending.clone()
    }

    /// Forgets a buffered play, e.g. after the user paused before readiness.
    pub fn cancel_pending_play(&self) {
        self.state.lock().pending.play = false;
    }

    /// Plays now, or once the source is ready.
    #[instrument(skip(self))]
    pub async fn request_play(&self) -> Result<()> {
        let source = self.adapter.current_source().ok_or(PlaybackError::NoSource)?;
        {
            let mut state = self.state.lock();
            if state.source == Some(source) && state.buffers() {
                debug!("Source not ready, deferring play");
                state.pending.play = true;
                return Ok(());
            }
        }

        self.wait_for_recovery(source).await?;
        self.play_with_retry(source).await
    }

    /// Seeks now, or records the target for when the source is ready.
    #[instrument(skip(self))]
    pub async fn request_seek(&self, time: f64) -> Result<SeekOutcome> {
        if !time.is_finite() {
            return Err(PlaybackError::SeekUnavailable(format!(
                "invalid seek target {time}"
            )));
        }
        let time = time.max(0.0);
        let source = self
            .adapter
            .current_source()
            .ok_or_else(|| PlaybackError::SeekUnavailable("no video source loaded".into()))?;
        {
            let mut state = self.state.lock();
            if state.source == Some(source) && state.buffers() {
                debug!(target_time = time, "Source not ready, deferring seek");
                state.pending.seek = Some(time);
                return Ok(SeekOutcome::Deferred);
            }
        }

        self.deliver_seek(source, time).await
    }

    /// Seeks again to a target whose read-back was off.
    ///
    /// Waits for recovery like any other command but skips de-duplication
    /// and the loop breaker, which would drop a repeat of the same target.
    pub async fn reseek(&self, source: SourceId, time: f64) -> Result<f64> {
        self.wait_for_recovery(source).await?;
        if !self.adapter.is_current(source) {
            return Err(PlaybackError::StaleSource);
        }
        self.adapter.seek(time).await
    }

    /// Handles a ready event of `source`.
    ///
    /// The first one moves the source from `NotReady` to `Flushing` and
    /// returns the replay of buffered operations for the caller to spawn;
    /// later ones return `None`. The replay seeks first, then plays;
    /// operations requested while it runs are replayed in the same order
    /// before the source counts as ready.
    pub fn on_ready_transition(
        self: &Arc<Self>,
        source: SourceId,
    ) -> Option<impl Future<Output = Result<()>> + 'static> {
        {
            let mut state = self.state.lock();
            if state.source != Some(source) || state.readiness != Readiness::NotReady {
                return None;
            }
            state.readiness = Readiness::Flushing;
        }
        let this = Arc::clone(self);
        Some(async move { this.flush_pending(source).await })
    }

    #[instrument(skip(self), fields(source = %source))]
    async fn flush_pending(&self, source: SourceId) -> Result<()> {
        let result = self.flush(source).await;

        let mut state = self.state.lock();
        if state.source == Some(source) {
            state.readiness = Readiness::Ready;
            if result.is_err() {
                state.pending = PendingOperation::default();
            }
        }
        result
    }

    async fn flush(&self, source: SourceId) -> Result<()> {
        loop {
            let pending = {
                let mut state = self.state.lock();
                if state.source != Some(source) {
                    return Err(PlaybackError::StaleSource);
                }
                std::mem::take(&mut state.pending)
            };
            if pending.is_empty() {
                return Ok(());
            }

            if let Some(time) = pending.seek {
                debug!(target_time = time, "Flushing pending seek");
                self.deliver_seek(source, time).await?;
            }
            if pending.play {
                if !self.adapter.is_current(source) {
                    return Err(PlaybackError::StaleSource);
                }
                debug!("Flushing pending play");
                self.wait_for_recovery(source).await?;
                self.play_with_retry(source).await?;
            }
        }
    }

    async fn deliver_seek(&self, source: SourceId, time: f64) -> Result<SeekOutcome> {
        self.wait_for_recovery(source).await?;

        if let Some(outcome) = self.admit_seek(time) {
            return Ok(outcome);
        }
        let applied = self.adapter.seek(time).await?;
        Ok(SeekOutcome::Applied(applied))
    }

    /// De-duplication and loop breaking. Returns `None` when the seek may
    /// go to the element, and records it.
    fn admit_seek(&self, time: f64) -> Option<SeekOutcome> {
        let now = Instant::now();
        let mut state = self.state.lock();

        if let Some((last, at)) = state.last_applied_seek {
            let remembered = self
                .config
                .seek_dedupe_interval
                .map_or(true, |interval| now.saturating_duration_since(at) < interval);
            if remembered && (time - last).abs() < self.config.seek_dedupe_window_secs {
                debug!(target_time = time, previous = last, "Dropping duplicate seek");
                return Some(SeekOutcome::Deduplicated);
            }
        }

        let window = self.config.rapid_seek_window;
        while let Some(oldest) = state.recent_seek_timestamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                state.recent_seek_timestamps.pop_front();
            } else {
                break;
            }
        }
        if state.recent_seek_timestamps.len() >= self.config.rapid_seek_limit {
            warn!(
                target_time = time,
                seeks = state.recent_seek_timestamps.len(),
                window_ms = window.as_millis() as u64,
                "Rapid seek loop detected, dropping seek"
            );
            return Some(SeekOutcome::Throttled);
        }

        state.recent_seek_timestamps.push_back(now);
        state.last_applied_seek = Some((time, now));
        None
    }

    /// Waits while recovery runs for `source`.
    async fn wait_for_recovery(&self, source: SourceId) -> Result<()> {
        let token = self.adapter.token_for(source)?;
        let mut status = self.recovery.clone();

        loop {
            let current = *status.borrow_and_update();
            match current {
                RecoveryStatus::Healthy => return Ok(()),
                RecoveryStatus::Failed => {
                    return Err(PlaybackError::RecoveryFailed(
                        "playback cannot continue for this video".to_string(),
                    ))
                }
                RecoveryStatus::Recovering { attempt } => {
                    debug!(attempt, "Waiting for recovery to settle");
                }
            }

            match until_cancelled(&token, status.changed()).await {
                None => return Err(PlaybackError::StaleSource),
                Some(Err(_)) => {
                    return Err(PlaybackError::Internal(
                        "recovery controller dropped".to_string(),
                    ))
                }
                Some(Ok(())) => {}
            }
        }
    }

    /// `play()`, retried when a concurrent pause or load interrupted it.
    async fn play_with_retry(&self, source: SourceId) -> Result<()> {
        let token = self.adapter.token_for(source)?;
        let policy = RetryPolicy::fixed(
            self.config.play_retry_attempts + 1,
            self.config.play_retry_delay,
        );

        let adapter = Arc::clone(&self.adapter);
        retry_with_backoff(
            policy,
            &token,
            |error: &PlaybackError| matches!(error, PlaybackError::PlayInterrupted(_)),
            move |_| {
                let adapter = Arc::clone(&adapter);
                async move { adapter.play().await }
            },
        )
        .await
        .map_err(|error| match error {
            RetryError::Cancelled => PlaybackError::StaleSource,
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted(error) => error,
        })
    }
}
