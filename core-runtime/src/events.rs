//! # Event Bus System
//!
//! Broadcasts engine events to any number of observers (UI layers, analytics,
//! the browser binding) using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: one enum per domain (playback, clips, recovery) plus
//!   user-facing notices
//! - **EventBus**: cloneable handle around the broadcast sender
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐    emit     ┌───────────┐
//! │ Media adapter ├────────────>│           │
//! └───────────────┘             │           │
//! ┌───────────────┐    emit     │ EventBus  │  subscribe   ┌────────────┐
//! │ Clip sequencer├────────────>│ (broadcast├─────────────>│ UI / host  │
//! └───────────────┘             │  channel) │              └────────────┘
//! ┌───────────────┐    emit     │           │
//! │ Recovery      ├────────────>│           │
//! └───────────────┘             └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ClipEvent, CoreEvent, EventBus};
//!
//! let bus = EventBus::new(100);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Clip(ClipEvent::Started {
//!     sequence_id: 1,
//!     start_time: 12.4,
//!     duration_seconds: 6.0,
//! }))
//! .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: every sender is gone; the player was dropped.
//!
//! Emitting with no subscribers returns an error; publishers ignore it with
//! `.ok()`.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// `timeupdate`-driven traffic is not published on the bus, so bursts stay
/// small. Subscribers that fall behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Source lifecycle and transport events
    Playback(PlaybackEvent),
    /// Clip sequence lifecycle
    Clip(ClipEvent),
    /// Automatic recovery progress
    Recovery(RecoveryEvent),
    /// Actionable message meant for the end user
    Notice(UserNotice),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Clip(e) => e.description(),
            CoreEvent::Recovery(e) => e.description(),
            CoreEvent::Notice(notice) => &notice.message,
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Recovery(RecoveryEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Clip(ClipEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Recovery(RecoveryEvent::Started { .. }) => EventSeverity::Warning,
            CoreEvent::Notice(notice) => notice.kind.severity(),
            CoreEvent::Playback(PlaybackEvent::SourceLoaded { .. }) => EventSeverity::Info,
            CoreEvent::Recovery(RecoveryEvent::Recovered { .. }) => EventSeverity::Info,
            CoreEvent::Recovery(RecoveryEvent::FormatSwapped { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Source lifecycle and transport events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new source was assigned to the element.
    SourceLoaded {
        source_id: String,
        /// Redacted URL (no query string).
        url: String,
    },
    /// The element can act on commands for the current source.
    Ready {
        source_id: String,
        /// Seconds; 0 when unknown.
        duration: f64,
    },
    Started {
        position: f64,
    },
    Paused {
        position: f64,
    },
    Seeked {
        position: f64,
    },
    Ended,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::SourceLoaded { .. } => "Video source loaded",
            PlaybackEvent::Ready { .. } => "Video ready",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Seeked { .. } => "Seek completed",
            PlaybackEvent::Ended => "Playback reached the end",
        }
    }
}

// ============================================================================
// Clip Events
// ============================================================================

/// Clip sequence lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ClipEvent {
    /// Playback of the clip began at its (verified) start time.
    Started {
        sequence_id: u64,
        start_time: f64,
        duration_seconds: f64,
    },
    /// The sequence ended without error.
    Terminated {
        sequence_id: u64,
        /// `completed`, `fallback_elapsed`, `stopped`, `superseded` or
        /// `source_changed`.
        reason: String,
    },
    /// The sequence could not start playback.
    Failed { sequence_id: u64, message: String },
}

impl ClipEvent {
    fn description(&self) -> &str {
        match self {
            ClipEvent::Started { .. } => "Clip playback started",
            ClipEvent::Terminated { .. } => "Clip playback ended",
            ClipEvent::Failed { .. } => "Clip playback failed",
        }
    }
}

// ============================================================================
// Recovery Events
// ============================================================================

/// Automatic recovery progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum RecoveryEvent {
    Started {
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    /// The source was replaced by its WebM sibling.
    FormatSwapped {
        /// Redacted URL of the replacement.
        url: String,
    },
    Recovered {
        attempts: u32,
    },
    /// Recovery gave up for the current source.
    Failed {
        message: String,
    },
}

impl RecoveryEvent {
    fn description(&self) -> &str {
        match self {
            RecoveryEvent::Started { .. } => "Attempting playback recovery",
            RecoveryEvent::FormatSwapped { .. } => "Switched to alternate video format",
            RecoveryEvent::Recovered { .. } => "Playback recovered",
            RecoveryEvent::Failed { .. } => "Playback recovery failed",
        }
    }
}

// ============================================================================
// User Notices
// ============================================================================

/// Category of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    /// Autoplay was blocked; the user must interact with the page.
    PlaybackBlocked,
    /// A clip could not be positioned at its start time.
    SeekFailed,
    /// Playback cannot continue for this source.
    PlaybackFailed,
}

impl NoticeKind {
    pub fn severity(&self) -> EventSeverity {
        match self {
            NoticeKind::PlaybackBlocked => EventSeverity::Warning,
            NoticeKind::SeekFailed => EventSeverity::Warning,
            NoticeKind::PlaybackFailed => EventSeverity::Error,
        }
    }
}

/// Actionable message for the end user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserNotice {
    pub kind: NoticeKind,
    pub message: String,
    /// Suggested next step, e.g. "Convert the video to WebM".
    pub action: Option<String>,
}

impl UserNotice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to engine events.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribes and wraps the receiver in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

#[cfg(target_arch = "wasm32")]
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventSeverity};
///
/// let bus = EventBus::new(16);
/// let notices = bus
///     .stream()
///     .filter(|event| event.severity() >= EventSeverity::Warning);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only events matching `predicate` are returned by `recv()`.
    #[cfg(target_arch = "wasm32")]
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered matching event.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
