//! # Playback Error Types
//!
//! Error taxonomy for the video playback engine.

use bridge_traits::{BridgeError, MediaErrorKind, NativeMediaError, PlayRejection};
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// A command needs a loaded source and none is assigned.
    #[error("No video source loaded")]
    NoSource,

    /// The source changed while the operation was suspended.
    #[error("Video source changed while the operation was pending")]
    StaleSource,

    /// The host could not turn a video id into a URL.
    #[error("Failed to resolve video source: {0}")]
    SourceResolution(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// The browser refused to start playback without a user gesture.
    #[error("Playback blocked by the browser: {0}")]
    PlaybackBlocked(String),

    /// `play()` was interrupted by a later pause or load.
    #[error("Play request interrupted: {0}")]
    PlayInterrupted(String),

    /// Seeking is not possible right now.
    #[error("Seek unavailable: {0}")]
    SeekUnavailable(String),

    /// The player never reported a position close enough to the target.
    #[error(
        "Seek to {target:.2}s not confirmed after {attempts} attempts (player at {actual:.2}s)"
    )]
    SeekVerificationFailed {
        target: f64,
        actual: f64,
        attempts: u32,
    },

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f64),

    // ========================================================================
    // Native Media Errors
    // ========================================================================
    /// The native element reported an error.
    #[error("Native media error ({kind:?}): {message}")]
    NativeMedia {
        kind: MediaErrorKind,
        message: String,
    },

    /// Automatic recovery gave up for the current source.
    #[error("Playback recovery failed: {0}")]
    RecoveryFailed(String),

    // ========================================================================
    // Clip Errors
    // ========================================================================
    /// Clip parameters are out of range.
    #[error("Invalid clip: {0}")]
    InvalidClip(String),

    /// The clip belongs to a source that is no longer loaded.
    #[error("Clip request targets a video source that is no longer loaded")]
    StaleClipRequest,

    /// A newer clip request replaced this one.
    #[error("Clip sequence superseded by a newer request")]
    Superseded,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::PlayInterrupted(_) | PlaybackError::SeekVerificationFailed { .. } => {
                true
            }
            PlaybackError::NativeMedia { kind, .. } => kind.is_network_error(),
            _ => false,
        }
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NativeMedia { kind, .. } if kind.is_network_error()
        )
    }

    /// Returns `true` if this error is related to container/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NativeMedia { kind, .. } if kind.is_format_error()
        )
    }

    /// Returns `true` for the conditions that must reach the end user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            PlaybackError::PlaybackBlocked(_)
                | PlaybackError::SeekVerificationFailed { .. }
                | PlaybackError::RecoveryFailed(_)
        )
    }

    /// Returns `true` when the operation was abandoned because newer work
    /// replaced it. These are resolved locally and never shown to the user.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            PlaybackError::StaleSource | PlaybackError::StaleClipRequest | PlaybackError::Superseded
        )
    }
}

impl From<NativeMediaError> for PlaybackError {
    fn from(error: NativeMediaError) -> Self {
        let message = error.describe();
        PlaybackError::NativeMedia {
            kind: error.kind,
            message,
        }
    }
}

impl From<PlayRejection> for PlaybackError {
    fn from(rejection: PlayRejection) -> Self {
        match rejection {
            PlayRejection::NotAllowed(message) => PlaybackError::PlaybackBlocked(message),
            PlayRejection::Aborted(message) => PlaybackError::PlayInterrupted(message),
            PlayRejection::NotSupported(message) => PlaybackError::NativeMedia {
                kind: MediaErrorKind::SourceNotSupported,
                message,
            },
            PlayRejection::Media(error) => error.into(),
            PlayRejection::Other(message) => PlaybackError::Internal(message),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
