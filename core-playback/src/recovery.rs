//! # Recovery Controller
//!
//! Bounded automatic recovery from native errors and stalls.
//!
//! ```text
//!            failure                 canplay / loadedmetadata
//! Healthy ────────────> Recovering(n) ─────────────────────────> Healthy
//!                          │    ▲
//!                          │    │ failure, n < max
//!                          └────┘
//!                          │
//!                          │ failure, n == max (or no playable format)
//!                          ▼
//!                        Failed (terminal for the source)
//! ```
//!
//! One attempt pauses, reloads the source (cache-busted after network
//! errors), waits for the element to settle, restores the last known
//! position and resumes. A failure that arrives while an attempt is in
//! flight supersedes it and counts as that attempt's failure.
//!
//! Decode and container errors do not consume attempts: the source is
//! swapped once for its `.webm` sibling, and when that is impossible the
//! controller fails immediately with a conversion recommendation.

use crate::adapter::MediaAdapter;
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::source::cache_busted;
use crate::state::StateStore;
use bridge_traits::{MediaEvent, NativeMediaError, SourceId};
use core_async::sync::{watch, CancellationToken};
use core_async::time::{sleep_or_cancel, Instant};
use core_runtime::events::{CoreEvent, EventBus, NoticeKind, RecoveryEvent, UserNotice};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Suggested user action once recovery gives up.
pub const CONVERSION_ADVICE: &str = "Convert the video to WebM and upload it again";

/// Recovery state of the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RecoveryStatus {
    Healthy,
    Recovering { attempt: u32 },
    /// Terminal; no further automatic retries for this source.
    Failed,
}

impl RecoveryStatus {
    pub fn is_recovering(&self) -> bool {
        matches!(self, RecoveryStatus::Recovering { .. })
    }
}

/// What sent the controller into recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryTrigger {
    MediaError(NativeMediaError),
    /// Native `stalled` event.
    Stalled,
    /// No `timeupdate` progress while playing.
    Heartbeat { idle: Duration },
    /// The previous attempt did not bring the element back in time.
    AttemptTimedOut,
}

impl RecoveryTrigger {
    pub fn describe(&self) -> String {
        match self {
            RecoveryTrigger::MediaError(error) => error.describe(),
            RecoveryTrigger::Stalled => "Video playback stalled".to_string(),
            RecoveryTrigger::Heartbeat { idle } => {
                format!("No playback progress for {:.1}s", idle.as_secs_f64())
            }
            RecoveryTrigger::AttemptTimedOut => "Recovery attempt timed out".to_string(),
        }
    }

    fn is_format_error(&self) -> bool {
        matches!(self, RecoveryTrigger::MediaError(error) if error.kind.is_format_error())
    }

    fn is_network_error(&self) -> bool {
        matches!(self, RecoveryTrigger::MediaError(error) if error.kind.is_network_error())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptKind {
    Reload { network: bool },
    FormatSwap,
}

#[derive(Default)]
struct RecoveryState {
    source: Option<SourceId>,
    attempt_count: u32,
    last_known_position: Option<f64>,
    /// Bumped for every attempt; stale attempts compare against it.
    generation: u64,
    attempt_token: Option<CancellationToken>,
    /// Readiness seen since the current attempt reloaded the source.
    metadata_loaded: bool,
    /// The current attempt finished restoring position and is waiting for
    /// readiness.
    restored: bool,
    last_progress: Option<(f64, Instant)>,
}

impl RecoveryState {
    fn for_source(source: SourceId) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    fn cancel_attempt(&mut self) {
        if let Some(token) = self.attempt_token.take() {
            token.cancel();
        }
        self.metadata_loaded = false;
        self.restored = false;
    }
}

enum Decision {
    Attempt {
        kind: AttemptKind,
        attempt: u32,
        generation: u64,
        token: CancellationToken,
    },
    Fail(String),
}

pub struct RecoveryController {
    adapter: Arc<MediaAdapter>,
    store: Arc<StateStore>,
    events: EventBus,
    config: Arc<PlayerConfig>,
    status: watch::Sender<RecoveryStatus>,
    state: Mutex<RecoveryState>,
}

impl RecoveryController {
    pub fn new(
        adapter: Arc<MediaAdapter>,
        store: Arc<StateStore>,
        events: EventBus,
        config: Arc<PlayerConfig>,
    ) -> Self {
        let (status, _) = watch::channel(RecoveryStatus::Healthy);
        Self {
            adapter,
            store,
            events,
            config,
            status,
            state: Mutex::new(RecoveryState::default()),
        }
    }

    pub fn status(&self) -> RecoveryStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecoveryStatus> {
        self.status.subscribe()
    }

    /// Attempts used so far for the current source.
    pub fn attempt_count(&self) -> u32 {
        self.state.lock().attempt_count
    }

    /// Forgets everything about the previous source.
    pub fn reset(&self, source: SourceId) {
        {
            let mut state = self.state.lock();
            state.cancel_attempt();
            *state = RecoveryState::for_source(source);
        }
        self.status.send_replace(RecoveryStatus::Healthy);
    }

    /// Feeds an accepted native event of `source`.
    pub fn observe(&self, source: SourceId, event: &MediaEvent) {
        match event {
            MediaEvent::TimeUpdate { current_time } => {
                let mut state = self.state.lock();
                if state.source != Some(source) {
                    return;
                }
                let moved = state
                    .last_progress
                    .map_or(true, |(position, _)| position != *current_time);
                if moved {
                    state.last_progress = Some((*current_time, Instant::now()));
                }
            }
            MediaEvent::CanPlay | MediaEvent::LoadedData | MediaEvent::LoadedMetadata { .. } => {
                if !self.status().is_recovering() {
                    return;
                }
                let resolved = {
                    let mut state = self.state.lock();
                    if state.source != Some(source) || state.attempt_token.is_none() {
                        return;
                    }
                    state.metadata_loaded = true;
                    state.restored
                };
                if resolved {
                    self.recovered(source);
                }
            }
            _ => {}
        }
    }

    /// Enters or continues recovery for `source`.
    pub fn handle_failure(self: &Arc<Self>, source: SourceId, trigger: RecoveryTrigger) {
        if self.status() == RecoveryStatus::Failed {
            debug!(reason = %trigger.describe(), "Recovery already failed, ignoring");
            return;
        }

        let position = self.adapter.current_time();
        let can_swap = trigger.is_format_error() && self.adapter.can_swap_format(source);
        let max_attempts = self.config.max_recovery_attempts;

        let decision = {
            let mut state = self.state.lock();
            if state.source != Some(source) {
                debug!(%source, "Failure reported for a stale source");
                return;
            }

            if state.attempt_token.is_some() {
                debug!(generation = state.generation, "Superseding in-flight recovery attempt");
            }
            state.cancel_attempt();
            if state.last_known_position.is_none() {
                state.last_known_position = Some(position);
            }

            let kind = if trigger.is_format_error() {
                can_swap.then_some(AttemptKind::FormatSwap)
            } else if state.attempt_count >= max_attempts {
                None
            } else {
                state.attempt_count += 1;
                Some(AttemptKind::Reload {
                    network: trigger.is_network_error(),
                })
            };

            match kind {
                Some(kind) => {
                    let token = self.adapter.source_token().child_token();
                    state.generation += 1;
                    state.attempt_token = Some(token.clone());
                    Decision::Attempt {
                        kind,
                        attempt: state.attempt_count,
                        generation: state.generation,
                        token,
                    }
                }
                None if trigger.is_format_error() => Decision::Fail(format!(
                    "This video format cannot be played in your browser ({})",
                    trigger.describe()
                )),
                None => Decision::Fail(format!(
                    "Playback failed after {} recovery attempts ({})",
                    state.attempt_count,
                    trigger.describe()
                )),
            }
        };

        match decision {
            Decision::Fail(message) => self.fail(source, message),
            Decision::Attempt {
                kind,
                attempt,
                generation,
                token,
            } => {
                let reason = trigger.describe();
                warn!(attempt, max_attempts, reason = %reason, "Starting playback recovery");

                self.status
                    .send_replace(RecoveryStatus::Recovering { attempt });
                self.store
                    .transition(source, |state| state.begin_recovery(reason.clone()));
                self.events
                    .emit(CoreEvent::Recovery(RecoveryEvent::Started {
                        attempt,
                        max_attempts,
                        reason,
                    }))
                    .ok();

                let this = Arc::clone(self);
                core_async::spawn(async move {
                    this.run_attempt(source, kind, attempt, generation, token)
                        .await;
                });
            }
        }
    }

    async fn run_attempt(
        self: Arc<Self>,
        source: SourceId,
        kind: AttemptKind,
        attempt: u32,
        generation: u64,
        token: CancellationToken,
    ) {
        match self.drive_attempt(source, kind, generation, &token).await {
            Ok(()) => {}
            Err(error) if error.is_stale() => {
                debug!(attempt, "Recovery attempt abandoned");
                return;
            }
            Err(PlaybackError::RecoveryFailed(message)) => {
                self.fail(source, message);
                return;
            }
            Err(error) => {
                // The element reports its own failure through an error event.
                warn!(attempt, error = %error, "Recovery attempt step failed");
            }
        }

        if sleep_or_cancel(&token, self.config.recovery_attempt_timeout).await {
            warn!(attempt, "Recovery attempt did not complete in time");
            self.handle_failure(source, RecoveryTrigger::AttemptTimedOut);
        }
    }

    async fn drive_attempt(
        &self,
        source: SourceId,
        kind: AttemptKind,
        generation: u64,
        token: &CancellationToken,
    ) -> Result<()> {
        if token.is_cancelled() {
            return Err(PlaybackError::Superseded);
        }
        self.adapter.pause();

        match kind {
            AttemptKind::Reload { network } => {
                let url = self
                    .adapter
                    .url_for(source)
                    .ok_or(PlaybackError::StaleSource)?;
                let url = if network {
                    cache_busted(&url, &self.config.cache_bust_param, generation)
                } else {
                    self.adapter.rewind();
                    url
                };
                self.adapter.reload(source, &url)?;
            }
            AttemptKind::FormatSwap => {
                if !self.adapter.try_format_fallback(source).await? {
                    return Err(PlaybackError::RecoveryFailed(
                        "This video format cannot be played and no WebM version is available"
                            .to_string(),
                    ));
                }
            }
        }

        if !sleep_or_cancel(token, self.config.recovery_settle_delay).await {
            return Err(PlaybackError::Superseded);
        }

        let position = self.state.lock().last_known_position.unwrap_or(0.0);
        if position > 0.0 {
            self.adapter.seek(position).await?;
        }
        if token.is_cancelled() {
            return Err(PlaybackError::Superseded);
        }

        if let Err(error) = self.adapter.play().await {
            if error.is_stale() {
                return Err(error);
            }
            debug!(error = %error, "Resume after recovery reload failed");
        }

        let resolved = {
            let mut state = self.state.lock();
            if state.generation != generation || token.is_cancelled() {
                return Err(PlaybackError::Superseded);
            }
            state.restored = true;
            state.metadata_loaded
        };
        if resolved {
            self.recovered(source);
        }
        Ok(())
    }

    fn recovered(&self, source: SourceId) {
        let is_playing = !self.adapter.is_paused();
        let attempts = {
            let mut state = self.state.lock();
            if state.source != Some(source) {
                return;
            }
            state.cancel_attempt();
            state.last_known_position = None;
            state.last_progress = None;
            std::mem::take(&mut state.attempt_count)
        };

        info!(attempts, "Playback recovered");
        self.status.send_replace(RecoveryStatus::Healthy);
        self.store
            .transition(source, |state| state.recovered(is_playing));
        self.events
            .emit(CoreEvent::Recovery(RecoveryEvent::Recovered { attempts }))
            .ok();
    }

    fn fail(&self, source: SourceId, message: String) {
        {
            let mut state = self.state.lock();
            if state.source != Some(source) {
                return;
            }
            state.cancel_attempt();
        }

        error!(message = %message, "Playback recovery failed");
        self.status.send_replace(RecoveryStatus::Failed);
        self.adapter.pause();
        self.store
            .transition(source, |state| state.fail(message.clone()));
        self.events
            .emit(CoreEvent::Recovery(RecoveryEvent::Failed {
                message: message.clone(),
            }))
            .ok();
        self.events
            .emit(CoreEvent::Notice(
                UserNotice::new(NoticeKind::PlaybackFailed, message)
                    .with_action(CONVERSION_ADVICE),
            ))
            .ok();
    }

    // ========================================================================
    // Stall heartbeat
    // ========================================================================

    /// Checks for missing progress once.
    pub fn heartbeat_tick(self: &Arc<Self>, source: SourceId) {
        if self.status() != RecoveryStatus::Healthy {
            return;
        }
        let snapshot = self.store.snapshot();
        if snapshot.source != Some(source) {
            return;
        }

        let now = Instant::now();
        let idle = {
            let mut state = self.state.lock();
            if state.source != Some(source) {
                return;
            }
            match state.last_progress {
                // Buffering counts: a `waiting` that never resolves is a stall.
                Some((_, at)) if snapshot.is_playing => now.saturating_duration_since(at),
                _ => {
                    state.last_progress = Some((snapshot.current_time, now));
                    return;
                }
            }
        };

        if idle >= self.config.stall_timeout {
            warn!(idle_ms = idle.as_millis() as u64, "No playback progress, assuming stall");
            self.handle_failure(source, RecoveryTrigger::Heartbeat { idle });
        }
    }

    /// Runs the heartbeat until `token` is cancelled.
    pub fn spawn_heartbeat(self: &Arc<Self>, source: SourceId, token: CancellationToken) {
        let this = Arc::clone(self);
        let interval = self.config.heartbeat_interval;
        core_async::spawn(async move {
            while sleep_or_cancel(&token, interval).await {
                this.heartbeat_tick(source);
            }
            debug!(%source, "Heartbeat stopped");
        });
    }
}
