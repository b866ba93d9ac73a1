//! WebAssembly bindings for core-playback
//!
//! JavaScript/TypeScript-friendly wrapper around [`VideoPlayer`]. The host
//! page hands over its `<video>` element; everything else (event listeners,
//! recovery, clip timing) runs inside the engine.
//!
//! ```javascript
//! enableConsoleLogging();
//! const player = new JsVideoPlayer(document.querySelector("video"));
//! player.onStateChange((state) => render(state));
//! player.loadSource("https://cdn.example.com/game-7.mp4");
//! await player.playClip(12.4, 6, "Q1 dunk");
//! ```

use crate::config::PlayerConfig;
use crate::coordinator::SeekOutcome;
use crate::player::VideoPlayer;
use crate::sequencer::ClipRequest;
use crate::timeline::{ClipDefinition, Marker};
use bridge_wasm::{build_wasm_bridges, WasmBridgeConfig};
use core_async::sync::broadcast::error::RecvError;
use core_runtime::config::CoreConfig;
use js_sys::{Function, Promise};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlVideoElement;

/// Enable Rust logging to browser console
/// Call this once at startup to see tracing logs in DevTools
#[wasm_bindgen(js_name = enableConsoleLogging)]
pub fn enable_console_logging() {
    use bridge_traits::LogLevel;
    use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

    #[cfg(feature = "wasm")]
    console_error_panic_hook::set_once();

    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    let _ = init_logging(config);
}

fn to_js_error<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(to_js_error)
}

fn seek_outcome(outcome: SeekOutcome) -> JsValue {
    match outcome {
        SeekOutcome::Applied(time) => JsValue::from_f64(time),
        SeekOutcome::Deferred => JsValue::from_str("deferred"),
        SeekOutcome::Deduplicated => JsValue::from_str("deduplicated"),
        SeekOutcome::Throttled => JsValue::from_str("throttled"),
    }
}

/// JavaScript-accessible video player
#[wasm_bindgen]
pub struct JsVideoPlayer {
    inner: VideoPlayer,
}

#[wasm_bindgen]
impl JsVideoPlayer {
    /// Create a player around `video`.
    ///
    /// * `resolver` - optional `(videoId) => url | Promise<url>` used by `loadVideo`
    /// * `config_json` - optional partial `PlayerConfig` as JSON
    #[wasm_bindgen(constructor)]
    pub fn new(
        video: HtmlVideoElement,
        resolver: Option<Function>,
        config_json: Option<String>,
    ) -> Result<JsVideoPlayer, JsValue> {
        let config = match config_json {
            Some(json) => PlayerConfig::from_json(&json).map_err(to_js_error)?,
            None => PlayerConfig::default(),
        };

        let mut bridge_config = WasmBridgeConfig::default();
        if let Some(callback) = resolver {
            bridge_config = bridge_config.with_resolver(callback);
        }
        let bridges = build_wasm_bridges(video, bridge_config).map_err(to_js_error)?;

        let mut builder = CoreConfig::builder().media_element(bridges.media_element);
        if let Some(http) = bridges.http_client {
            builder = builder.http_client(http);
        }
        if let Some(resolver) = bridges.source_resolver {
            builder = builder.source_resolver(resolver);
        }
        let core = builder.build().map_err(to_js_error)?;

        let inner = VideoPlayer::new(core, config).map_err(to_js_error)?;
        Ok(Self { inner })
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    /// Load `url`; returns the new source id.
    #[wasm_bindgen(js_name = loadSource)]
    pub fn load_source(&self, url: &str) -> String {
        self.inner.load_source(url).to_string()
    }

    /// Resolve `videoId` through the host resolver and load it.
    #[wasm_bindgen(js_name = loadVideo)]
    pub fn load_video(&self, video_id: String) -> Promise {
        let player = self.inner.clone();
        future_to_promise(async move {
            let source = player.load_video(&video_id).await.map_err(to_js_error)?;
            Ok(JsValue::from_str(&source.to_string()))
        })
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub fn play(&self) -> Promise {
        let player = self.inner.clone();
        future_to_promise(async move {
            player.play().await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn pause(&self) {
        self.inner.pause();
    }

    /// Resolves with the applied position, or `"deferred"`, `"deduplicated"`
    /// or `"throttled"`.
    #[wasm_bindgen(js_name = seekTo)]
    pub fn seek_to(&self, time: f64) -> Promise {
        let player = self.inner.clone();
        future_to_promise(async move {
            let outcome = player.seek_to_time(time).await.map_err(to_js_error)?;
            Ok(seek_outcome(outcome))
        })
    }

    #[wasm_bindgen(js_name = currentTime)]
    pub fn current_time(&self) -> f64 {
        self.inner.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.inner.duration()
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f64) -> Result<(), JsValue> {
        self.inner.set_volume(volume).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = setMuted)]
    pub fn set_muted(&self, muted: bool) {
        self.inner.set_muted(muted);
    }

    // ------------------------------------------------------------------
    // Clips
    // ------------------------------------------------------------------

    /// Play `[startTime, startTime + duration)` of the current source.
    /// Resolves with the sequence id once playback of the clip began.
    #[wasm_bindgen(js_name = playClip)]
    pub fn play_clip(&self, start_time: f64, duration: f64, label: Option<String>) -> Promise {
        let player = self.inner.clone();
        future_to_promise(async move {
            let source = player
                .current_source()
                .ok_or_else(|| JsValue::from_str("no video source loaded"))?;
            let mut request = ClipRequest::new(source, start_time, duration);
            if let Some(label) = label {
                request = request.with_label(label);
            }
            let id = player.play_clip(request).await.map_err(to_js_error)?;
            Ok(JsValue::from_f64(id.value() as f64))
        })
    }

    /// Play a stored clip (`{ startTime, duration, label }`).
    #[wasm_bindgen(js_name = playClipDefinition)]
    pub fn play_clip_definition(&self, clip: JsValue) -> Promise {
        let player = self.inner.clone();
        future_to_promise(async move {
            let clip: ClipDefinition = serde_wasm_bindgen::from_value(clip).map_err(to_js_error)?;
            let id = player
                .play_clip_definition(&clip)
                .await
                .map_err(to_js_error)?;
            Ok(JsValue::from_f64(id.value() as f64))
        })
    }

    #[wasm_bindgen(js_name = stopClip)]
    pub fn stop_clip(&self) {
        self.inner.stop_clip();
    }

    #[wasm_bindgen(js_name = clipStatus)]
    pub fn clip_status(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.clip_status())
    }

    // ------------------------------------------------------------------
    // Timeline
    // ------------------------------------------------------------------

    /// Replace the markers (`[{ time, label, color? }]`).
    #[wasm_bindgen(js_name = setMarkers)]
    pub fn set_markers(&self, markers: JsValue) -> Result<(), JsValue> {
        let markers: Vec<Marker> = serde_wasm_bindgen::from_value(markers).map_err(to_js_error)?;
        self.inner.set_markers(markers);
        Ok(())
    }

    #[wasm_bindgen(js_name = timelineHover)]
    pub fn timeline_hover(&self, fraction: f64) -> Result<JsValue, JsValue> {
        to_js(&self.inner.timeline_hover(fraction))
    }

    #[wasm_bindgen(js_name = timelineClearHover)]
    pub fn timeline_clear_hover(&self) {
        self.inner.timeline_clear_hover();
    }

    #[wasm_bindgen(js_name = timelineClick)]
    pub fn timeline_click(&self, fraction: f64) -> Promise {
        let player = self.inner.clone();
        future_to_promise(async move {
            let outcome = player.timeline_click(fraction).await.map_err(to_js_error)?;
            Ok(outcome.map(seek_outcome).unwrap_or(JsValue::NULL))
        })
    }

    #[wasm_bindgen(js_name = timelineDragStart)]
    pub fn timeline_drag_start(&self, fraction: f64) {
        self.inner.timeline_drag_start(fraction);
    }

    #[wasm_bindgen(js_name = timelineDragTo)]
    pub fn timeline_drag_to(&self, fraction: f64) -> Option<f64> {
        self.inner.timeline_drag_to(fraction)
    }

    #[wasm_bindgen(js_name = timelineDragEnd)]
    pub fn timeline_drag_end(&self) -> Promise {
        let player = self.inner.clone();
        future_to_promise(async move {
            let outcome = player.timeline_drag_end().await.map_err(to_js_error)?;
            Ok(outcome.map(seek_outcome).unwrap_or(JsValue::NULL))
        })
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Current `PlaybackState` snapshot.
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.snapshot())
    }

    #[wasm_bindgen(js_name = isVideoReady)]
    pub fn is_video_ready(&self) -> bool {
        self.inner.is_video_ready()
    }

    #[wasm_bindgen(js_name = recoveryStatus)]
    pub fn recovery_status(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.recovery_status())
    }

    /// Call `callback(state)` now and after every state change.
    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&self, callback: Function) {
        let mut updates = self.inner.subscribe();
        core_async::spawn(async move {
            loop {
                let state = updates.borrow_and_update().clone();
                match serde_wasm_bindgen::to_value(&state) {
                    Ok(value) => {
                        let _ = callback.call1(&JsValue::NULL, &value);
                    }
                    Err(error) => tracing::warn!(error = %error, "Cannot serialize playback state"),
                }
                if updates.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// Call `callback(event)` for every engine event (clips, recovery,
    /// user notices).
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&self, callback: Function) {
        let mut events = self.inner.events();
        core_async::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Ok(value) = serde_wasm_bindgen::to_value(&event) {
                            let _ = callback.call1(&JsValue::NULL, &value);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Event listener lagged")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}
