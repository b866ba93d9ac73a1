//! Recording fake of the native video element.
//!
//! Commands are recorded with the (paused) tokio clock and answered with the
//! events a browser would fire, synchronously and re-entrantly, which is the
//! harshest ordering the engine has to cope with.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    HttpClient, MediaElement, MediaErrorKind, MediaEvent, MediaEventEnvelope, MediaEventSink,
    NativeMediaError, PlayRejection, SourceId, VideoSourceResolver,
};
use core_playback::{PlayerConfig, VideoPlayer};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventStream};
use mockall::mock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetSource(String),
    Load,
    Play,
    Pause,
    Seek(f64),
    Volume(f64),
    Muted(bool),
}

struct ElementState {
    sink: Option<Arc<dyn MediaEventSink>>,
    source: Option<SourceId>,
    paused: bool,
    position: f64,
    duration: f64,
    volume: f64,
    muted: bool,
    auto_ready: bool,
    /// Added to the requested position of the next seeks, one per seek.
    seek_offsets: VecDeque<f64>,
    /// Added to every seek once `seek_offsets` is drained.
    drift: f64,
    play_rejections: VecDeque<PlayRejection>,
    calls: Vec<(Instant, Call)>,
}

pub struct FakeElement {
    state: Mutex<ElementState>,
}

impl FakeElement {
    pub fn new(duration: f64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ElementState {
                sink: None,
                source: None,
                paused: true,
                position: 0.0,
                duration,
                volume: 1.0,
                muted: false,
                auto_ready: true,
                seek_offsets: VecDeque::new(),
                drift: 0.0,
                play_rejections: VecDeque::new(),
                calls: Vec::new(),
            }),
        })
    }

    /// Whether `load()` answers with `loadedmetadata` and `canplay`.
    pub fn set_auto_ready(&self, auto_ready: bool) {
        self.state.lock().auto_ready = auto_ready;
    }

    pub fn set_drift(&self, drift: f64) {
        self.state.lock().drift = drift;
    }

    pub fn push_seek_offset(&self, offset: f64) {
        self.state.lock().seek_offsets.push_back(offset);
    }

    pub fn reject_next_play(&self, rejection: PlayRejection) {
        self.state.lock().play_rejections.push_back(rejection);
    }

    pub fn set_position(&self, position: f64) {
        self.state.lock().position = position;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.iter().map(|(_, call)| call.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.state.lock().calls.clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Seek(time) => Some(time),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    pub fn sources(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetSource(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn current_source(&self) -> Option<SourceId> {
        self.state.lock().source
    }

    /// Fires `event` stamped with the source the element shows.
    pub fn fire(&self, event: MediaEvent) {
        let source = self.state.lock().source;
        if let Some(source) = source {
            self.fire_for(source, event);
        }
    }

    /// Fires `event` stamped with `source`, e.g. a late event of an old source.
    pub fn fire_for(&self, source: SourceId, event: MediaEvent) {
        let sink = self.state.lock().sink.clone();
        if let Some(sink) = sink {
            sink.dispatch(MediaEventEnvelope::new(source, event));
        }
    }

    pub fn fire_error(&self, kind: MediaErrorKind) {
        self.fire(MediaEvent::Error(NativeMediaError::new(kind, "")));
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push((Instant::now(), call));
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    fn set_event_sink(&self, sink: Arc<dyn MediaEventSink>) {
        self.state.lock().sink = Some(sink);
    }

    fn set_source(&self, source: SourceId, url: &str) {
        self.record(Call::SetSource(url.to_string()));
        self.state.lock().source = Some(source);
    }

    fn load(&self) {
        self.record(Call::Load);
        let (auto_ready, duration) = {
            let mut state = self.state.lock();
            state.position = 0.0;
            state.paused = true;
            (state.auto_ready, state.duration)
        };
        if auto_ready {
            self.fire(MediaEvent::LoadedMetadata { duration });
            self.fire(MediaEvent::CanPlay);
        }
    }

    async fn play(&self) -> Result<(), PlayRejection> {
        self.record(Call::Play);
        let rejection = self.state.lock().play_rejections.pop_front();
        if let Some(rejection) = rejection {
            return Err(rejection);
        }
        self.state.lock().paused = false;
        self.fire(MediaEvent::Play);
        self.fire(MediaEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        self.record(Call::Pause);
        self.state.lock().paused = true;
        self.fire(MediaEvent::Pause);
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn set_current_time(&self, seconds: f64) {
        self.record(Call::Seek(seconds));
        let position = {
            let mut state = self.state.lock();
            let offset = match state.seek_offsets.pop_front() {
                Some(offset) => offset,
                None => state.drift,
            };
            state.position = seconds + offset;
            state.position
        };
        self.fire(MediaEvent::Seeking);
        self.fire(MediaEvent::Seeked {
            current_time: position,
        });
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn set_volume(&self, volume: f64) {
        self.record(Call::Volume(volume));
        let muted = {
            let mut state = self.state.lock();
            state.volume = volume;
            state.muted
        };
        self.fire(MediaEvent::VolumeChange { volume, muted });
    }

    fn set_muted(&self, muted: bool) {
        self.record(Call::Muted(muted));
        let volume = {
            let mut state = self.state.lock();
            state.muted = muted;
            state.volume
        };
        self.fire(MediaEvent::VolumeChange { volume, muted });
    }
}

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: bridge_traits::HttpRequest) -> bridge_traits::error::Result<bridge_traits::HttpResponse>;
    }
}

mock! {
    pub Resolver {}

    #[async_trait]
    impl VideoSourceResolver for Resolver {
        async fn resolve(&self, video_id: &str) -> bridge_traits::error::Result<String>;
    }
}

/// Defaults for tests: no heartbeat unless a test opts in.
pub fn quiet_config() -> PlayerConfig {
    PlayerConfig {
        stall_detection_enabled: false,
        ..PlayerConfig::default()
    }
}

pub struct Harness {
    pub player: VideoPlayer,
    pub element: Arc<FakeElement>,
    pub events: EventStream,
}

impl Harness {
    pub fn new(config: PlayerConfig) -> Self {
        Self::build(config, None, None)
    }

    pub fn build(
        config: PlayerConfig,
        http: Option<Arc<dyn HttpClient>>,
        resolver: Option<Arc<dyn VideoSourceResolver>>,
    ) -> Self {
        let element = FakeElement::new(120.0);
        let mut builder = CoreConfig::builder().media_element(element.clone());
        if let Some(http) = http {
            builder = builder.http_client(http);
        }
        if let Some(resolver) = resolver {
            builder = builder.source_resolver(resolver);
        }
        let core = builder.build().expect("core config");
        let player = VideoPlayer::new(core, config).expect("player");
        let events = player.events();

        Self {
            player,
            element,
            events,
        }
    }

    /// Loads `url` and lets the readiness flush run.
    pub async fn load_ready(&self, url: &str) -> SourceId {
        let source = self.player.load_source(url);
        settle().await;
        source
    }

    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        self.events.drain()
    }
}

/// Lets spawned tasks run without moving the clock noticeably.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
