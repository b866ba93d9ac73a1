//! Media Element Abstraction
//!
//! The contract between the playback engine and the host's native video
//! element (an `HTMLVideoElement` in the browser, a recording fake in tests).
//!
//! Commands flow engine → element through [`MediaElement`]. Native events flow
//! element → engine through [`MediaEventSink`] as [`MediaEventEnvelope`]s.
//! Every envelope is stamped with the [`SourceId`] the element was showing
//! when the event fired, which lets the engine drop events that belong to a
//! source it has already replaced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::platform::PlatformSendSync;

/// Identity of one loaded video source.
///
/// A fresh id is minted on every source load, even when the same URL is
/// loaded twice. Recovery reloads keep the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Category of a native media error, mirroring the `MediaError.code` values
/// of the HTML media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaErrorKind {
    /// Fetching was aborted by the user agent (`MEDIA_ERR_ABORTED`).
    Aborted,
    /// A network error interrupted fetching (`MEDIA_ERR_NETWORK`).
    Network,
    /// The resource could not be decoded (`MEDIA_ERR_DECODE`).
    Decode,
    /// The container or codec is not supported (`MEDIA_ERR_SRC_NOT_SUPPORTED`).
    SourceNotSupported,
    Unknown,
}

impl MediaErrorKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => MediaErrorKind::Aborted,
            2 => MediaErrorKind::Network,
            3 => MediaErrorKind::Decode,
            4 => MediaErrorKind::SourceNotSupported,
            _ => MediaErrorKind::Unknown,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            MediaErrorKind::Aborted => 1,
            MediaErrorKind::Network => 2,
            MediaErrorKind::Decode => 3,
            MediaErrorKind::SourceNotSupported => 4,
            MediaErrorKind::Unknown => 0,
        }
    }

    /// Decode and container/codec failures. Reloading the same bytes will
    /// not fix these.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            MediaErrorKind::Decode | MediaErrorKind::SourceNotSupported
        )
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, MediaErrorKind::Network)
    }
}

/// Error reported by the native element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeMediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl NativeMediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Human-readable description, falling back to a generic text when the
    /// browser supplied an empty message.
    pub fn describe(&self) -> String {
        if !self.message.is_empty() {
            return self.message.clone();
        }
        match self.kind {
            MediaErrorKind::Aborted => "Video loading was aborted".to_string(),
            MediaErrorKind::Network => "A network error interrupted video loading".to_string(),
            MediaErrorKind::Decode => "The video could not be decoded".to_string(),
            MediaErrorKind::SourceNotSupported => {
                "The video format is not supported by this browser".to_string()
            }
            MediaErrorKind::Unknown => "Unknown video error".to_string(),
        }
    }
}

/// Native media events the engine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Play,
    Playing,
    Pause,
    TimeUpdate { current_time: f64 },
    Waiting,
    Stalled,
    Error(NativeMediaError),
    CanPlay,
    LoadedData,
    LoadedMetadata { duration: f64 },
    DurationChange { duration: f64 },
    VolumeChange { volume: f64, muted: bool },
    Seeking,
    Seeked { current_time: f64 },
    Ended,
}

impl MediaEvent {
    /// DOM event name.
    pub fn name(&self) -> &'static str {
        match self {
            MediaEvent::Play => "play",
            MediaEvent::Playing => "playing",
            MediaEvent::Pause => "pause",
            MediaEvent::TimeUpdate { .. } => "timeupdate",
            MediaEvent::Waiting => "waiting",
            MediaEvent::Stalled => "stalled",
            MediaEvent::Error(_) => "error",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::LoadedData => "loadeddata",
            MediaEvent::LoadedMetadata { .. } => "loadedmetadata",
            MediaEvent::DurationChange { .. } => "durationchange",
            MediaEvent::VolumeChange { .. } => "volumechange",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked { .. } => "seeked",
            MediaEvent::Ended => "ended",
        }
    }

    /// Events that mean enough data is available to act on commands.
    pub fn signals_readiness(&self) -> bool {
        matches!(self, MediaEvent::CanPlay | MediaEvent::LoadedData)
    }
}

/// A native event tagged with the source it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEventEnvelope {
    pub source: SourceId,
    pub event: MediaEvent,
}

impl MediaEventEnvelope {
    pub fn new(source: SourceId, event: MediaEvent) -> Self {
        Self { source, event }
    }
}

/// Receiver of native events.
///
/// Elements may call `dispatch` re-entrantly from inside a command (for
/// example a fake element emitting `seeked` from `set_current_time`), so
/// implementations must not hold locks across calls into the element.
pub trait MediaEventSink: PlatformSendSync {
    fn dispatch(&self, envelope: MediaEventEnvelope);
}

/// Why a `play()` request was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayRejection {
    /// Autoplay policy requires a user gesture (`NotAllowedError`).
    #[error("playback not allowed: {0}")]
    NotAllowed(String),

    /// No supported source (`NotSupportedError`).
    #[error("source not supported: {0}")]
    NotSupported(String),

    /// Interrupted by a later `pause()` or `load()` (`AbortError`).
    #[error("play request interrupted: {0}")]
    Aborted(String),

    /// The element is in an error state.
    #[error("media error: {}", .0.describe())]
    Media(NativeMediaError),

    #[error("play failed: {0}")]
    Other(String),
}

/// Native video element contract.
///
/// All reads are direct native reads. `duration()` may be `NaN` or infinite
/// before metadata loads; callers sanitize it.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait MediaElement: PlatformSendSync {
    /// Install the receiver for native events. Replaces any previous sink.
    fn set_event_sink(&self, sink: Arc<dyn MediaEventSink>);

    /// Assign `url` as the element's source. Events of the resulting load are
    /// stamped with `source`; events the element had already queued for the
    /// previous source keep their old stamp.
    fn set_source(&self, source: SourceId, url: &str);

    /// Begin (re)loading the assigned source.
    fn load(&self);

    /// Start playback. Resolves once the element accepted the request.
    async fn play(&self) -> Result<(), PlayRejection>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    fn current_time(&self) -> f64;

    /// Set the playback position; completion is signalled by `seeked`.
    fn set_current_time(&self, seconds: f64);

    fn duration(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn set_muted(&self, muted: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_round_trips_html_codes() {
        for code in 1..=4 {
            assert_eq!(MediaErrorKind::from_code(code).code(), code);
        }
        assert_eq!(MediaErrorKind::from_code(42), MediaErrorKind::Unknown);
    }

    #[test]
    fn error_kind_classification() {
        assert!(MediaErrorKind::Decode.is_format_error());
        assert!(MediaErrorKind::SourceNotSupported.is_format_error());
        assert!(!MediaErrorKind::Network.is_format_error());
        assert!(MediaErrorKind::Network.is_network_error());
    }

    #[test]
    fn describe_falls_back_when_message_empty() {
        let err = NativeMediaError::new(MediaErrorKind::Decode, "");
        assert_eq!(err.describe(), "The video could not be decoded");

        let err = NativeMediaError::new(MediaErrorKind::Network, "net::ERR_CONNECTION_RESET");
        assert_eq!(err.describe(), "net::ERR_CONNECTION_RESET");
    }

    #[test]
    fn source_ids_are_unique() {
        let a = SourceId::new();
        let b = SourceId::new();
        assert_ne!(a, b);
        assert_eq!(SourceId::from_uuid(*a.as_uuid()), a);
    }

    #[test]
    fn readiness_events() {
        assert!(MediaEvent::CanPlay.signals_readiness());
        assert!(MediaEvent::LoadedData.signals_readiness());
        assert!(!MediaEvent::LoadedMetadata { duration: 10.0 }.signals_readiness());
        assert_eq!(MediaEvent::Seeked { current_time: 1.0 }.name(), "seeked");
    }
}
