//! # Playback State Store
//!
//! [`PlaybackState`] is the single source of truth for rendering one video
//! session. It only changes through pure transitions: [`PlaybackState::apply`]
//! for native events, plus the recovery transitions driven by the recovery
//! controller. [`StateStore`] publishes snapshots through a watch channel and
//! drops events stamped with a source it no longer shows.

use bridge_traits::{MediaEvent, MediaEventEnvelope, SourceId};
use core_async::sync::watch;
use serde::Serialize;
use tracing::debug;

/// Observable state of the current video session.
///
/// Invariants: `has_error` implies `!is_playing`, `is_recovering` implies
/// `has_error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Source this snapshot describes.
    pub source: Option<SourceId>,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
    pub is_recovering: bool,
    /// Seconds, never negative.
    pub current_time: f64,
    /// Seconds; 0 while unknown.
    pub duration: f64,
    /// In `[0, 1]`.
    pub volume: f64,
    pub is_muted: bool,
    /// Metadata loaded or `canplay` seen for the current source.
    pub is_video_ready: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            source: None,
            is_playing: false,
            is_buffering: false,
            has_error: false,
            error_message: None,
            is_recovering: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            is_muted: false,
            is_video_ready: false,
        }
    }
}

/// Clamps a native duration to a usable value; `NaN`, infinite (live) and
/// negative readings become 0.
pub fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

fn sanitize_time(time: f64) -> f64 {
    if time.is_finite() && time > 0.0 {
        time
    } else {
        0.0
    }
}

impl PlaybackState {
    /// Applies one native event.
    pub fn apply(&self, event: &MediaEvent) -> PlaybackState {
        let mut next = self.clone();
        match event {
            MediaEvent::Play => {
                next.is_playing = !next.has_error;
            }
            MediaEvent::Playing => {
                next.is_playing = !next.has_error;
                next.is_buffering = false;
            }
            MediaEvent::Pause | MediaEvent::Ended => {
                next.is_playing = false;
            }
            MediaEvent::TimeUpdate { current_time } | MediaEvent::Seeked { current_time } => {
                next.current_time = sanitize_time(*current_time);
            }
            MediaEvent::Waiting | MediaEvent::Stalled => {
                next.is_buffering = true;
            }
            MediaEvent::Error(error) => {
                next.has_error = true;
                next.error_message = Some(error.describe());
                next.is_playing = false;
                next.is_buffering = false;
            }
            MediaEvent::CanPlay | MediaEvent::LoadedData => {
                next.is_video_ready = true;
                next.is_buffering = false;
            }
            MediaEvent::LoadedMetadata { duration } => {
                next.duration = sanitize_duration(*duration);
                next.is_video_ready = true;
            }
            MediaEvent::DurationChange { duration } => {
                next.duration = sanitize_duration(*duration);
            }
            MediaEvent::VolumeChange { volume, muted } => {
                next.volume = if volume.is_finite() {
                    volume.clamp(0.0, 1.0)
                } else {
                    next.volume
                };
                next.is_muted = *muted;
            }
            MediaEvent::Seeking => {}
        }
        next
    }

    /// Fresh state for a newly assigned source. Volume and mute are user
    /// preferences and survive source changes.
    pub fn reset(&self, source: SourceId) -> PlaybackState {
        PlaybackState {
            source: Some(source),
            volume: self.volume,
            is_muted: self.is_muted,
            ..PlaybackState::default()
        }
    }

    pub fn begin_recovery(&self, message: impl Into<String>) -> PlaybackState {
        PlaybackState {
            has_error: true,
            error_message: Some(message.into()),
            is_recovering: true,
            is_playing: false,
            is_buffering: false,
            ..self.clone()
        }
    }

    /// Recovery succeeded; `is_playing` reflects whether the element resumed.
    pub fn recovered(&self, is_playing: bool) -> PlaybackState {
        PlaybackState {
            has_error: false,
            error_message: None,
            is_recovering: false,
            is_buffering: false,
            is_video_ready: true,
            is_playing,
            ..self.clone()
        }
    }

    /// Terminal failure for the current source.
    pub fn fail(&self, message: impl Into<String>) -> PlaybackState {
        PlaybackState {
            has_error: true,
            error_message: Some(message.into()),
            is_recovering: false,
            is_playing: false,
            is_buffering: false,
            ..self.clone()
        }
    }

    /// Playback progress in `[0, 1]`, `None` while the duration is unknown.
    pub fn progress(&self) -> Option<f64> {
        if self.duration > 0.0 {
            Some((self.current_time / self.duration).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

/// Watch-channel backed holder of the current [`PlaybackState`].
pub struct StateStore {
    sender: watch::Sender<PlaybackState>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(PlaybackState::default());
        Self { sender }
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.sender.subscribe()
    }

    pub fn current_source(&self) -> Option<SourceId> {
        self.sender.borrow().source
    }

    /// Starts a fresh session for `source`.
    pub fn reset(&self, source: SourceId) {
        self.sender.send_modify(|state| *state = state.reset(source));
    }

    /// Applies a native event. Returns `false` when the envelope belongs to
    /// a source other than the current one; such events are dropped.
    pub fn dispatch(&self, envelope: &MediaEventEnvelope) -> bool {
        let mut accepted = false;
        self.sender.send_if_modified(|state| {
            if state.source != Some(envelope.source) {
                return false;
            }
            accepted = true;
            let next = state.apply(&envelope.event);
            if next == *state {
                return false;
            }
            *state = next;
            true
        });

        if !accepted {
            debug!(
                event = envelope.event.name(),
                source = %envelope.source,
                "Dropping event from stale source"
            );
        }
        accepted
    }

    /// Applies `transition` if `source` is still current.
    pub fn transition<F>(&self, source: SourceId, transition: F) -> bool
    where
        F: FnOnce(&PlaybackState) -> PlaybackState,
    {
        let mut applied = false;
        self.sender.send_if_modified(|state| {
            if state.source != Some(source) {
                return false;
            }
            applied = true;
            let next = transition(state);
            if next == *state {
                return false;
            }
            *state = next;
            true
        });
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{MediaErrorKind, NativeMediaError};

    fn loaded() -> (StateStore, SourceId) {
        let store = StateStore::new();
        let source = SourceId::new();
        store.reset(source);
        (store, source)
    }

    #[test]
    fn transport_transitions() {
        let state = PlaybackState::default();
        let state = state.apply(&MediaEvent::Play);
        assert!(state.is_playing);

        let state = state.apply(&MediaEvent::Waiting);
        assert!(state.is_buffering);

        let state = state.apply(&MediaEvent::Playing);
        assert!(state.is_playing && !state.is_buffering);

        let state = state.apply(&MediaEvent::Ended);
        assert!(!state.is_playing);
    }

    #[test]
    fn error_stops_playback() {
        let state = PlaybackState::default()
            .apply(&MediaEvent::Playing)
            .apply(&MediaEvent::Error(NativeMediaError::new(
                MediaErrorKind::Network,
                "",
            )));

        assert!(state.has_error);
        assert!(!state.is_playing);
        assert_eq!(
            state.error_message.as_deref(),
            Some("A network error interrupted video loading")
        );

        // Play events cannot flip is_playing while the error stands.
        let state = state.apply(&MediaEvent::Play);
        assert!(!state.is_playing);
    }

    #[test]
    fn metadata_sanitizes_duration() {
        let state = PlaybackState::default().apply(&MediaEvent::LoadedMetadata {
            duration: f64::NAN,
        });
        assert_eq!(state.duration, 0.0);
        assert!(state.is_video_ready);
        assert_eq!(state.progress(), None);

        let state = state
            .apply(&MediaEvent::DurationChange { duration: 40.0 })
            .apply(&MediaEvent::TimeUpdate { current_time: 10.0 });
        assert_eq!(state.progress(), Some(0.25));

        let state = state.apply(&MediaEvent::DurationChange {
            duration: f64::INFINITY,
        });
        assert_eq!(state.duration, 0.0);
    }

    #[test]
    fn volume_change_is_clamped() {
        let state = PlaybackState::default().apply(&MediaEvent::VolumeChange {
            volume: 1.7,
            muted: true,
        });
        assert_eq!(state.volume, 1.0);
        assert!(state.is_muted);
    }

    #[test]
    fn recovery_transitions_keep_invariants() {
        let state = PlaybackState::default()
            .apply(&MediaEvent::Playing)
            .begin_recovery("stalled");
        assert!(state.is_recovering && state.has_error && !state.is_playing);

        let state = state.recovered(true);
        assert!(!state.has_error && !state.is_recovering && state.is_playing);
        assert_eq!(state.error_message, None);

        let state = state.begin_recovery("again").fail("gave up");
        assert!(state.has_error && !state.is_recovering && !state.is_playing);
        assert_eq!(state.error_message.as_deref(), Some("gave up"));
    }

    #[test]
    fn reset_keeps_volume_preferences() {
        let (store, source) = loaded();
        store.dispatch(&MediaEventEnvelope::new(
            source,
            MediaEvent::VolumeChange {
                volume: 0.4,
                muted: true,
            },
        ));
        store.dispatch(&MediaEventEnvelope::new(source, MediaEvent::Playing));

        let next = SourceId::new();
        store.reset(next);
        let state = store.snapshot();
        assert_eq!(state.source, Some(next));
        assert!(!state.is_playing);
        assert_eq!(state.volume, 0.4);
        assert!(state.is_muted);
    }

    #[test]
    fn stale_envelopes_are_dropped() {
        let (store, source) = loaded();
        let stale = SourceId::new();

        assert!(!store.dispatch(&MediaEventEnvelope::new(stale, MediaEvent::Playing)));
        assert!(!store.snapshot().is_playing);

        assert!(store.dispatch(&MediaEventEnvelope::new(source, MediaEvent::Playing)));
        assert!(store.snapshot().is_playing);
    }

    #[test]
    fn transition_requires_current_source() {
        let (store, source) = loaded();
        assert!(!store.transition(SourceId::new(), |s| s.fail("x")));
        assert!(!store.snapshot().has_error);

        assert!(store.transition(source, |s| s.fail("x")));
        assert!(store.snapshot().has_error);
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let (store, source) = loaded();
        let mut rx = store.subscribe();
        let _ = rx.borrow_and_update();

        store.dispatch(&MediaEventEnvelope::new(
            source,
            MediaEvent::TimeUpdate { current_time: 3.0 },
        ));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().current_time, 3.0);
    }
}
