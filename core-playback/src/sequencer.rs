//! # Clip Playback Sequencer
//!
//! Plays an arbitrary `[start, start + duration]` window of the current
//! video:
//!
//! 1. Stop the active clip, if any, and let its pause settle
//! 2. Pause
//! 3. Seek to the start and verify the read-back position, retrying with
//!    backoff (first attempt through the coordinator, later ones as plain
//!    re-seeks that still wait for recovery)
//! 4. Play
//! 5. Pause again after the clip duration (or end the sequence after the
//!    fallback window when the clip has no duration)
//!
//! Each sequence owns a cancellation token derived from the source token.
//! Starting a new clip, stopping, or changing the source cancels it, which
//! aborts in-flight steps and the auto-stop timer.

use crate::adapter::MediaAdapter;
use crate::config::PlayerConfig;
use crate::coordinator::ReadinessCoordinator;
use crate::error::{PlaybackError, Result};
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};
use bridge_traits::SourceId;
use core_async::sync::{watch, CancellationToken};
use core_async::time::{sleep_or_cancel, until_cancelled};
use core_runtime::events::{ClipEvent, CoreEvent, EventBus, NoticeKind, UserNotice};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Identity of one clip sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SequenceId(u64);

impl SequenceId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip-{}", self.0)
    }
}

/// A clip to play on a specific source.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRequest {
    /// Seconds, `>= 0`.
    pub start_time: f64,
    /// Seconds, `>= 0`; 0 plays until stopped, bounded by the fallback
    /// window.
    pub duration_seconds: f64,
    pub source: SourceId,
    pub label: Option<String>,
}

impl ClipRequest {
    pub fn new(source: SourceId, start_time: f64, duration_seconds: f64) -> Self {
        Self {
            start_time,
            duration_seconds,
            source,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(PlaybackError::InvalidClip(format!(
                "start time must be a non-negative number, got {}",
                self.start_time
            )));
        }
        if Duration::try_from_secs_f64(self.duration_seconds).is_err() {
            return Err(PlaybackError::InvalidClip(format!(
                "duration must be a non-negative number of seconds, got {}",
                self.duration_seconds
            )));
        }
        Ok(())
    }
}

/// Why a sequence ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Paused after the clip duration.
    Completed,
    /// Clip without duration; the fallback window elapsed.
    FallbackElapsed,
    Stopped,
    Superseded,
    SourceChanged,
    Failed(String),
}

impl TerminationReason {
    pub fn as_str(&self) -> &str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::FallbackElapsed => "fallback_elapsed",
            TerminationReason::Stopped => "stopped",
            TerminationReason::Superseded => "superseded",
            TerminationReason::SourceChanged => "source_changed",
            TerminationReason::Failed(_) => "failed",
        }
    }
}

/// Observable sequencer status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ClipStatus {
    Idle,
    Preparing {
        id: SequenceId,
    },
    Playing {
        id: SequenceId,
        start_time: f64,
        duration_seconds: f64,
    },
    Terminated {
        id: SequenceId,
        reason: TerminationReason,
    },
}

struct ActiveClip {
    id: SequenceId,
    token: CancellationToken,
}

pub struct ClipSequencer {
    adapter: Arc<MediaAdapter>,
    coordinator: Arc<ReadinessCoordinator>,
    events: EventBus,
    config: Arc<PlayerConfig>,
    next_id: AtomicU64,
    active: Mutex<Option<ActiveClip>>,
    status: watch::Sender<ClipStatus>,
}

impl ClipSequencer {
    pub fn new(
        adapter: Arc<MediaAdapter>,
        coordinator: Arc<ReadinessCoordinator>,
        events: EventBus,
        config: Arc<PlayerConfig>,
    ) -> Self {
        let (status, _) = watch::channel(ClipStatus::Idle);
        Self {
            adapter,
            coordinator,
            events,
            config,
            next_id: AtomicU64::new(0),
            active: Mutex::new(None),
            status,
        }
    }

    pub fn status(&self) -> ClipStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClipStatus> {
        self.status.subscribe()
    }

    pub fn active_sequence(&self) -> Option<SequenceId> {
        self.active.lock().as_ref().map(|clip| clip.id)
    }

    /// Runs a clip sequence up to the start of playback.
    ///
    /// Resolves once the clip plays; the auto-stop runs in the background.
    #[instrument(skip(self, request), fields(start = request.start_time, duration = request.duration_seconds))]
    pub async fn play_clip(self: &Arc<Self>, request: ClipRequest) -> Result<SequenceId> {
        request.validate()?;
        let source_token = self
            .adapter
            .token_for(request.source)
            .map_err(|_| PlaybackError::StaleClipRequest)?;

        let id = SequenceId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let token = source_token.child_token();
        let previous = self.active.lock().replace(ActiveClip {
            id,
            token: token.clone(),
        });

        if let Some(previous) = previous {
            previous.token.cancel();
            self.adapter.pause();
            self.announce_termination(previous.id, TerminationReason::Superseded);
            if !sleep_or_cancel(&token, self.config.clip_restart_settle).await {
                return Err(self.cancellation_error(request.source));
            }
        }

        info!(sequence = %id, label = request.label.as_deref().unwrap_or(""), "Preparing clip");
        self.status.send_replace(ClipStatus::Preparing { id });

        if let Err(error) = self.prepare_and_play(&request, &token).await {
            self.abandon(id, &error);
            return Err(error);
        }

        if token.is_cancelled() {
            return Err(self.cancellation_error(request.source));
        }

        info!(sequence = %id, "Clip playing");
        self.status.send_replace(ClipStatus::Playing {
            id,
            start_time: request.start_time,
            duration_seconds: request.duration_seconds,
        });
        self.events
            .emit(CoreEvent::Clip(ClipEvent::Started {
                sequence_id: id.value(),
                start_time: request.start_time,
                duration_seconds: request.duration_seconds,
            }))
            .ok();

        let this = Arc::clone(self);
        let duration_seconds = request.duration_seconds;
        core_async::spawn(async move {
            this.auto_terminate(id, token, duration_seconds).await;
        });

        Ok(id)
    }

    async fn prepare_and_play(
        self: &Arc<Self>,
        request: &ClipRequest,
        token: &CancellationToken,
    ) -> Result<()> {
        self.adapter.pause();

        let source = request.source;
        let target = request.start_time;
        let tolerance = self.config.seek_tolerance_secs;
        let policy = RetryPolicy {
            max_attempts: self.config.seek_verify_attempts,
            base_delay: self.config.seek_retry_base_delay,
            max_delay: self.config.seek_retry_base_delay * 8,
            use_exponential_backoff: true,
        };

        let this = Arc::clone(self);
        let verified = retry_with_backoff(
            policy,
            token,
            |error: &PlaybackError| matches!(error, PlaybackError::SeekVerificationFailed { .. }),
            move |attempt| {
                let this = Arc::clone(&this);
                async move {
                    this.seek_and_verify(source, attempt, target, tolerance)
                        .await
                }
            },
        )
        .await;

        match verified {
            Ok(actual) => debug!(target_time = target, actual, "Clip start verified"),
            Err(RetryError::Cancelled) => return Err(self.cancellation_error(request.source)),
            Err(RetryError::Exhausted { last, .. }) | Err(RetryError::Aborted(last)) => {
                if let PlaybackError::SeekVerificationFailed { target, actual, .. } = &last {
                    warn!(target_time = target, actual, "Clip start could not be verified");
                    self.events
                        .emit(CoreEvent::Notice(
                            UserNotice::new(
                                NoticeKind::SeekFailed,
                                format!("Could not jump to {:.1}s in this video", target),
                            )
                            .with_action("Try the clip again"),
                        ))
                        .ok();
                }
                return Err(last);
            }
        }

        match until_cancelled(token, self.coordinator.request_play()).await {
            None => Err(self.cancellation_error(request.source)),
            Some(Ok(())) => Ok(()),
            Some(Err(PlaybackError::PlaybackBlocked(message))) => {
                warn!(reason = %message, "Clip playback blocked by the browser");
                self.events
                    .emit(CoreEvent::Notice(
                        UserNotice::new(
                            NoticeKind::PlaybackBlocked,
                            "The browser blocked playback of this clip",
                        )
                        .with_action("Click play to start the clip"),
                    ))
                    .ok();
                Err(PlaybackError::PlaybackBlocked(message))
            }
            Some(Err(error)) => Err(error),
        }
    }

    async fn seek_and_verify(
        &self,
        source: SourceId,
        attempt: u32,
        target: f64,
        tolerance: f64,
    ) -> Result<f64> {
        if attempt == 1 {
            self.coordinator.request_seek(target).await?;
        } else {
            debug!(attempt, target_time = target, "Retrying clip seek");
            self.coordinator.reseek(source, target).await?;
        }

        let actual = self.adapter.current_time();
        if (actual - target).abs() > tolerance {
            return Err(PlaybackError::SeekVerificationFailed {
                target,
                actual,
                attempts: attempt,
            });
        }
        Ok(actual)
    }

    async fn auto_terminate(
        self: Arc<Self>,
        id: SequenceId,
        token: CancellationToken,
        duration_seconds: f64,
    ) {
        let (wait, reason) = if duration_seconds > 0.0 {
            (
                Duration::try_from_secs_f64(duration_seconds).unwrap_or(Duration::MAX),
                TerminationReason::Completed,
            )
        } else {
            (
                self.config.clip_fallback_window,
                TerminationReason::FallbackElapsed,
            )
        };

        if !sleep_or_cancel(&token, wait).await {
            return;
        }
        if !self.take_active(id) {
            return;
        }

        if reason == TerminationReason::Completed {
            self.adapter.pause();
        }
        self.announce_termination(id, reason);
    }

    /// Stops the active clip and pauses.
    pub fn stop(&self) {
        let active = self.active.lock().take();
        self.adapter.pause();
        if let Some(active) = active {
            active.token.cancel();
            self.announce_termination(active.id, TerminationReason::Stopped);
        }
    }

    /// Ends the active clip because its source is being replaced.
    pub fn cancel_for_source_change(&self) {
        if let Some(active) = self.active.lock().take() {
            active.token.cancel();
            self.announce_termination(active.id, TerminationReason::SourceChanged);
        }
    }

    fn take_active(&self, id: SequenceId) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().map(|clip| clip.id) == Some(id) {
            *active = None;
            true
        } else {
            false
        }
    }

    fn abandon(&self, id: SequenceId, error: &PlaybackError) {
        if error.is_stale() {
            debug!(sequence = %id, error = %error, "Clip sequence abandoned");
            return;
        }
        if !self.take_active(id) {
            return;
        }
        self.events
            .emit(CoreEvent::Clip(ClipEvent::Failed {
                sequence_id: id.value(),
                message: error.to_string(),
            }))
            .ok();
        self.announce_termination(id, TerminationReason::Failed(error.to_string()));
    }

    fn cancellation_error(&self, source: SourceId) -> PlaybackError {
        if self.adapter.is_current(source) {
            PlaybackError::Superseded
        } else {
            PlaybackError::StaleSource
        }
    }

    fn announce_termination(&self, id: SequenceId, reason: TerminationReason) {
        info!(sequence = %id, reason = reason.as_str(), "Clip ended");
        self.events
            .emit(CoreEvent::Clip(ClipEvent::Terminated {
                sequence_id: id.value(),
                reason: reason.as_str().to_string(),
            }))
            .ok();
        self.status.send_replace(ClipStatus::Terminated { id, reason });
    }
}
