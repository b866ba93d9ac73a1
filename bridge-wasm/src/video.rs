//! WebAssembly implementation of the `MediaElement` bridge trait.
//!
//! Wraps an `HTMLVideoElement`. Every native event the engine cares about gets
//! a listener that translates it into a [`MediaEvent`], stamps it with the
//! source whose load produced it and forwards it to the installed
//! [`MediaEventSink`]. Listeners are removed when the wrapper is dropped.

use async_trait::async_trait;
use bridge_traits::{
    MediaElement, MediaErrorKind, MediaEvent, MediaEventEnvelope, MediaEventSink,
    NativeMediaError, PlayRejection, SourceId,
};
use std::{cell::RefCell, rc::Rc, sync::Arc};
use tracing::{debug, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{DomException, Event, HtmlMediaElement, HtmlVideoElement};

use crate::error::{WasmError, WasmResult};

/// Native events a listener is installed for.
const LISTENED_EVENTS: &[&str] = &[
    "loadstart",
    "play",
    "playing",
    "pause",
    "timeupdate",
    "waiting",
    "stalled",
    "error",
    "canplay",
    "loadeddata",
    "loadedmetadata",
    "durationchange",
    "volumechange",
    "seeking",
    "seeked",
    "ended",
];

/// Attribution of native events to sources.
///
/// Assigning `src` only records the request. Media element events are
/// delivered in order and every load starts with `loadstart`, so anything
/// delivered before that still belongs to the previous source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SourceStamp {
    requested: Option<SourceId>,
    loading: Option<SourceId>,
}

impl SourceStamp {
    fn request(&mut self, source: SourceId) {
        self.requested = Some(source);
    }

    fn load_started(&mut self) {
        self.loading = self.requested;
    }

    fn current(&self) -> Option<SourceId> {
        self.loading
    }
}

#[derive(Default)]
struct ElementState {
    stamp: SourceStamp,
    sink: Option<Arc<dyn MediaEventSink>>,
}

type Listener = Closure<dyn FnMut(Event)>;

/// `MediaElement` backed by a DOM `<video>` element.
pub struct WasmVideoElement {
    video: HtmlVideoElement,
    state: Rc<RefCell<ElementState>>,
    listeners: Vec<(&'static str, Listener)>,
}

impl WasmVideoElement {
    /// Attach to `video` and start listening for its media events.
    pub fn new(video: HtmlVideoElement) -> WasmResult<Self> {
        let state = Rc::new(RefCell::new(ElementState::default()));
        let mut listeners = Vec::with_capacity(LISTENED_EVENTS.len());

        for &name in LISTENED_EVENTS {
            let element = video.clone();
            let shared = Rc::clone(&state);
            let listener = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                if name == "loadstart" {
                    shared.borrow_mut().stamp.load_started();
                    return;
                }
                let Some(event) = translate(name, &element) else {
                    return;
                };
                // Release the borrow before dispatching; the sink may call
                // straight back into the element.
                let target = {
                    let state = shared.borrow();
                    state.stamp.current().zip(state.sink.clone())
                };
                if let Some((source, sink)) = target {
                    sink.dispatch(MediaEventEnvelope::new(source, event));
                }
            });
            video
                .add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
                .map_err(WasmError::from)?;
            listeners.push((name, listener));
        }

        Ok(Self {
            video,
            state,
            listeners,
        })
    }

    /// The wrapped DOM element.
    pub fn element(&self) -> &HtmlVideoElement {
        &self.video
    }

    fn media(&self) -> &HtmlMediaElement {
        self.video.unchecked_ref()
    }
}

impl Drop for WasmVideoElement {
    fn drop(&mut self) {
        for (name, listener) in &self.listeners {
            let _ = self
                .video
                .remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
        }
    }
}

#[async_trait(?Send)]
impl MediaElement for WasmVideoElement {
    fn set_event_sink(&self, sink: Arc<dyn MediaEventSink>) {
        self.state.borrow_mut().sink = Some(sink);
    }

    fn set_source(&self, source: SourceId, url: &str) {
        self.state.borrow_mut().stamp.request(source);
        self.media().set_src(url);
    }

    fn load(&self) {
        self.media().load();
    }

    async fn play(&self) -> Result<(), PlayRejection> {
        let promise = self.media().play().map_err(rejection)?;
        JsFuture::from(promise).await.map(|_| ()).map_err(|err| {
            let rejection = rejection(err);
            debug!(error = %rejection, "play() rejected");
            rejection
        })
    }

    fn pause(&self) {
        if let Err(err) = self.media().pause() {
            warn!(error = %WasmError::from(err), "pause() failed");
        }
    }

    fn is_paused(&self) -> bool {
        self.media().paused()
    }

    fn current_time(&self) -> f64 {
        self.media().current_time()
    }

    fn set_current_time(&self, seconds: f64) {
        self.media().set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        self.media().duration()
    }

    fn set_volume(&self, volume: f64) {
        self.media().set_volume(volume);
    }

    fn set_muted(&self, muted: bool) {
        self.media().set_muted(muted);
    }
}

fn translate(name: &str, video: &HtmlVideoElement) -> Option<MediaEvent> {
    let media: &HtmlMediaElement = video.unchecked_ref();
    let event = match name {
        "play" => MediaEvent::Play,
        "playing" => MediaEvent::Playing,
        "pause" => MediaEvent::Pause,
        "timeupdate" => MediaEvent::TimeUpdate {
            current_time: media.current_time(),
        },
        "waiting" => MediaEvent::Waiting,
        "stalled" => MediaEvent::Stalled,
        "error" => MediaEvent::Error(native_error(media).unwrap_or_else(|| {
            NativeMediaError::new(MediaErrorKind::Unknown, String::new())
        })),
        "canplay" => MediaEvent::CanPlay,
        "loadeddata" => MediaEvent::LoadedData,
        "loadedmetadata" => MediaEvent::LoadedMetadata {
            duration: media.duration(),
        },
        "durationchange" => MediaEvent::DurationChange {
            duration: media.duration(),
        },
        "volumechange" => MediaEvent::VolumeChange {
            volume: media.volume(),
            muted: media.muted(),
        },
        "seeking" => MediaEvent::Seeking,
        "seeked" => MediaEvent::Seeked {
            current_time: media.current_time(),
        },
        "ended" => MediaEvent::Ended,
        _ => return None,
    };
    Some(event)
}

fn native_error(media: &HtmlMediaElement) -> Option<NativeMediaError> {
    media
        .error()
        .map(|error| NativeMediaError::new(MediaErrorKind::from_code(error.code()), error.message()))
}

/// Maps a rejected `play()` promise onto the DOMException names browsers use.
fn rejection(err: JsValue) -> PlayRejection {
    match err.dyn_ref::<DomException>() {
        Some(exception) => {
            let message = exception.message();
            match exception.name().as_str() {
                "NotAllowedError" => PlayRejection::NotAllowed(message),
                "NotSupportedError" => PlayRejection::NotSupported(message),
                "AbortError" => PlayRejection::Aborted(message),
                _ => PlayRejection::Other(message),
            }
        }
        None => PlayRejection::Other(WasmError::from(err).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn stamp_switches_on_load_start() {
        let (first, second) = (SourceId::new(), SourceId::new());
        let mut stamp = SourceStamp::default();

        stamp.request(first);
        assert_eq!(stamp.current(), None);
        stamp.load_started();
        assert_eq!(stamp.current(), Some(first));

        stamp.request(second);
        assert_eq!(stamp.current(), Some(first));
        stamp.load_started();
        assert_eq!(stamp.current(), Some(second));
    }
}
