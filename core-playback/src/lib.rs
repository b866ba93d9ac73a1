//! # Video Playback & Clip Synchronization
//!
//! Keeps a native video element, a timeline of markers and clips, and
//! asynchronous seek/play commands consistent under unreliable network and
//! decoding conditions.
//!
//! ## Overview
//!
//! - [`state`]: observable playback state and its transition table
//! - [`adapter`]: the only component that commands the native element
//! - [`coordinator`]: readiness, pending operations, seek de-duplication and
//!   the rapid-seek loop breaker
//! - [`recovery`]: bounded automatic recovery and stall detection
//! - [`sequencer`]: pause, seek, verify, play, auto-stop for clips
//! - [`timeline`]: marker/clip layout and scrubber interaction
//! - [`player`]: the [`VideoPlayer`] handle wiring everything together
//!
//! Every component runs on tokio natively and on the browser event loop in
//! WebAssembly builds, through `core-async`.

pub mod adapter;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod player;
pub mod recovery;
pub mod retry;
pub mod sequencer;
pub mod source;
pub mod state;
pub mod timeline;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::PlayerConfig;
pub use coordinator::{PendingOperation, Readiness, SeekOutcome};
pub use error::{PlaybackError, Result};
pub use player::VideoPlayer;
pub use recovery::{RecoveryStatus, RecoveryTrigger};
pub use sequencer::{ClipRequest, ClipStatus, SequenceId, TerminationReason};
pub use state::PlaybackState;
pub use timeline::{ClipDefinition, Marker, TimelineOverlay};
