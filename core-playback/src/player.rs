//! # Video Player
//!
//! The imperative handle the UI talks to. Wires the state store, adapter,
//! coordinator, recovery controller and clip sequencer together and pumps
//! native events through them.
//!
//! ## Event pump
//!
//! ```text
//! element ──envelope──> store (stale guard, transition table)
//!                        ├─> recovery.observe (progress / readiness)
//!                        ├─> adapter.note_seeked
//!                        ├─> recovery.handle_failure (error, stalled)
//!                        └─> coordinator.on_ready_transition (canplay, loadeddata)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let player = VideoPlayer::new(core_config, PlayerConfig::default())?;
//! let source = player.load_source("https://cdn.example.com/game-7.mp4");
//!
//! player.play_clip(ClipRequest::new(source, 12.4, 6.0)).await?;
//! ```

use crate::adapter::MediaAdapter;
use crate::config::PlayerConfig;
use crate::coordinator::{ReadinessCoordinator, SeekOutcome};
use crate::error::{PlaybackError, Result};
use crate::recovery::{RecoveryController, RecoveryStatus, RecoveryTrigger};
use crate::sequencer::{ClipRequest, ClipSequencer, ClipStatus, SequenceId};
use crate::state::{PlaybackState, StateStore};
use crate::timeline::{ClipDefinition, Marker, TimelineHover, TimelineOverlay};
use bridge_traits::{
    MediaEvent, MediaEventEnvelope, MediaEventSink, SourceId, VideoSourceResolver,
};
use core_async::sync::watch;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

/// Cloneable handle to one video session.
#[derive(Clone)]
pub struct VideoPlayer {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    store: Arc<StateStore>,
    adapter: Arc<MediaAdapter>,
    coordinator: Arc<ReadinessCoordinator>,
    recovery: Arc<RecoveryController>,
    sequencer: Arc<ClipSequencer>,
    resolver: Option<Arc<dyn VideoSourceResolver>>,
    events: EventBus,
    config: Arc<PlayerConfig>,
    /// Bumped by every load; a `load_video` whose resolution finishes after
    /// a newer load is discarded.
    load_generation: AtomicU64,
    timeline: Mutex<TimelineOverlay>,
}

/// Forwards native events to the player without keeping it alive.
struct PlayerEventSink {
    inner: Weak<PlayerInner>,
}

impl MediaEventSink for PlayerEventSink {
    fn dispatch(&self, envelope: MediaEventEnvelope) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch(envelope);
        }
    }
}

impl VideoPlayer {
    /// Builds a player around the bridges in `core`.
    pub fn new(core: CoreConfig, config: PlayerConfig) -> Result<Self> {
        core.validate()?;
        config.validate().map_err(PlaybackError::Config)?;

        let config = Arc::new(config);
        let events = EventBus::new(core.event_buffer_size);
        let store = Arc::new(StateStore::new());
        let adapter = Arc::new(MediaAdapter::new(
            Arc::clone(&core.media_element),
            Arc::clone(&store),
            core.http_client.clone(),
            Arc::clone(&config),
            events.clone(),
        ));
        let recovery = Arc::new(RecoveryController::new(
            Arc::clone(&adapter),
            Arc::clone(&store),
            events.clone(),
            Arc::clone(&config),
        ));
        let coordinator = Arc::new(ReadinessCoordinator::new(
            Arc::clone(&adapter),
            recovery.subscribe(),
            Arc::clone(&config),
        ));
        let sequencer = Arc::new(ClipSequencer::new(
            Arc::clone(&adapter),
            Arc::clone(&coordinator),
            events.clone(),
            Arc::clone(&config),
        ));

        let inner = Arc::new(PlayerInner {
            store,
            adapter,
            coordinator,
            recovery,
            sequencer,
            resolver: core.source_resolver.clone(),
            events,
            config,
            load_generation: AtomicU64::new(0),
            timeline: Mutex::new(TimelineOverlay::default()),
        });

        core.media_element.set_event_sink(Arc::new(PlayerEventSink {
            inner: Arc::downgrade(&inner),
        }));

        Ok(Self { inner })
    }

    // ========================================================================
    // Sources
    // ========================================================================

    /// Replaces the current video with `url`.
    pub fn load_source(&self, url: &str) -> SourceId {
        self.inner.load_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.load_source(url)
    }

    /// Resolves a stored video id through the host and loads it. When
    /// another load starts while the id resolves, the newer load wins and
    /// this one returns `Superseded`.
    #[instrument(skip(self))]
    pub async fn load_video(&self, video_id: &str) -> Result<SourceId> {
        let resolver = self.inner.resolver.clone().ok_or_else(|| {
            PlaybackError::Runtime(core_runtime::Error::CapabilityMissing {
                capability: "VideoSourceResolver".to_string(),
                message: "load_video needs a VideoSourceResolver in the CoreConfig".to_string(),
            })
        })?;

        let generation = self.inner.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let url = resolver
            .resolve(video_id)
            .await
            .map_err(|error| PlaybackError::SourceResolution(error.to_string()))?;

        if self.inner.load_generation.load(Ordering::SeqCst) != generation {
            debug!(video_id, "A newer load replaced this one");
            return Err(PlaybackError::Superseded);
        }
        Ok(self.inner.load_source(&url))
    }

    pub fn current_source(&self) -> Option<SourceId> {
        self.inner.adapter.current_source()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Plays now, or as soon as the video is ready.
    pub async fn play(&self) -> Result<()> {
        self.inner.coordinator.request_play().await
    }

    pub fn pause(&self) {
        self.inner.coordinator.cancel_pending_play();
        self.inner.adapter.pause();
    }

    pub async fn seek_to_time(&self, time: f64) -> Result<SeekOutcome> {
        self.inner.coordinator.request_seek(time).await
    }

    pub fn current_time(&self) -> f64 {
        self.inner.adapter.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.inner.adapter.duration()
    }

    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.inner.adapter.set_volume(volume)
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.adapter.set_muted(muted)
    }

    // ========================================================================
    // Clips
    // ========================================================================

    pub async fn play_clip(&self, request: ClipRequest) -> Result<SequenceId> {
        self.inner.sequencer.play_clip(request).await
    }

    /// Plays a stored clip on the current source.
    pub async fn play_clip_definition(&self, clip: &ClipDefinition) -> Result<SequenceId> {
        let source = self.current_source().ok_or(PlaybackError::NoSource)?;
        self.play_clip(clip.to_request(source)).await
    }

    pub fn stop_clip(&self) {
        self.inner.sequencer.stop();
    }

    pub fn clip_status(&self) -> ClipStatus {
        self.inner.sequencer.status()
    }

    pub fn subscribe_clip_status(&self) -> watch::Receiver<ClipStatus> {
        self.inner.sequencer.subscribe()
    }

    // ========================================================================
    // Timeline
    // ========================================================================

    pub fn set_markers(&self, markers: Vec<Marker>) {
        self.inner.timeline.lock().set_markers(markers);
    }

    pub fn timeline_hover(&self, fraction: f64) -> Option<TimelineHover> {
        let duration = self.inner.store.snapshot().duration;
        let mut timeline = self.inner.timeline.lock();
        timeline.set_duration(duration);
        timeline.hover(fraction)
    }

    pub fn timeline_clear_hover(&self) {
        self.inner.timeline.lock().clear_hover();
    }

    /// Seeks to the clicked position (snapped to a nearby marker).
    pub async fn timeline_click(&self, fraction: f64) -> Result<Option<SeekOutcome>> {
        let target = {
            let duration = self.inner.store.snapshot().duration;
            let mut timeline = self.inner.timeline.lock();
            timeline.set_duration(duration);
            timeline.click(fraction)
        };
        match target {
            Some(time) => self.seek_to_time(time).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn timeline_drag_start(&self, fraction: f64) {
        let duration = self.inner.store.snapshot().duration;
        let mut timeline = self.inner.timeline.lock();
        timeline.set_duration(duration);
        timeline.begin_drag(fraction);
    }

    /// Time under the drag handle, for previews.
    pub fn timeline_drag_to(&self, fraction: f64) -> Option<f64> {
        self.inner.timeline.lock().drag_to(fraction)
    }

    /// Ends the drag and seeks to where it was released.
    pub async fn timeline_drag_end(&self) -> Result<Option<SeekOutcome>> {
        let target = self.inner.timeline.lock().end_drag();
        match target {
            Some(time) => self.seek_to_time(time).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn seek_to_marker(&self, marker: &Marker) -> Result<SeekOutcome> {
        self.seek_to_time(marker.time).await
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn snapshot(&self) -> PlaybackState {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.store.subscribe()
    }

    pub fn is_video_ready(&self) -> bool {
        self.inner.store.snapshot().is_video_ready
    }

    pub fn recovery_status(&self) -> RecoveryStatus {
        self.inner.recovery.status()
    }

    pub fn events(&self) -> EventStream {
        self.inner.events.stream()
    }

    pub fn event_bus(&self) -> EventBus {
        self.inner.events.clone()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }
}

impl PlayerInner {
    fn load_source(&self, url: &str) -> SourceId {
        self.sequencer.cancel_for_source_change();

        let source = self.adapter.prepare_source(url);
        self.coordinator.reset(source);
        self.recovery.reset(source);
        self.adapter.attach_source(source);

        if self.config.stall_detection_enabled {
            if let Ok(token) = self.adapter.token_for(source) {
                self.recovery.spawn_heartbeat(source, token);
            }
        }
        source
    }

    fn dispatch(&self, envelope: MediaEventEnvelope) {
        if !self.store.dispatch(&envelope) {
            return;
        }
        let source = envelope.source;
        self.recovery.observe(source, &envelope.event);

        match &envelope.event {
            MediaEvent::Seeked { current_time } => {
                self.adapter.note_seeked();
                self.emit(PlaybackEvent::Seeked {
                    position: *current_time,
                });
            }
            MediaEvent::Playing => self.emit(PlaybackEvent::Started {
                position: self.adapter.current_time(),
            }),
            MediaEvent::Pause => self.emit(PlaybackEvent::Paused {
                position: self.adapter.current_time(),
            }),
            MediaEvent::Ended => self.emit(PlaybackEvent::Ended),
            MediaEvent::Error(error) => {
                warn!(kind = ?error.kind, message = %error.describe(), "Native media error");
                self.recovery
                    .handle_failure(source, RecoveryTrigger::MediaError(error.clone()));
            }
            MediaEvent::Stalled => {
                self.recovery.handle_failure(source, RecoveryTrigger::Stalled);
            }
            _ => {}
        }

        if !envelope.event.signals_readiness() {
            return;
        }
        if let Some(flush) = self.coordinator.on_ready_transition(source) {
            info!(%source, "Video ready");
            self.emit(PlaybackEvent::Ready {
                source_id: source.to_string(),
                duration: self.adapter.duration(),
            });

            core_async::spawn(async move {
                match flush.await {
                    Ok(()) => {}
                    Err(error) if error.is_stale() => {
                        debug!(error = %error, "Pending operations dropped")
                    }
                    Err(error) => warn!(error = %error, "Replaying pending operations failed"),
                }
            });
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }
}

impl Drop for PlayerInner {
    fn drop(&mut self) {
        self.adapter.shutdown();
    }
}
