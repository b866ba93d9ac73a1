//! # Media Element Adapter
//!
//! Sole owner of the [`MediaElement`] handle. Every native command the
//! engine issues goes through here.
//!
//! ## Source lifecycle
//!
//! Each source load mints a fresh [`SourceId`] and a cancellation token that
//! is a child of the adapter's root token. Replacing the source cancels the
//! previous token synchronously, which tears down every timer and suspended
//! operation bound to the old source before the new one starts loading.
//!
//! ## Locking
//!
//! The element may dispatch events re-entrantly from inside a command, so no
//! lock is held while calling into the element.

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::source::{webm_sibling, ActiveSource};
use crate::state::{sanitize_duration, StateStore};
use bridge_traits::{HttpClient, MediaElement, SourceId};
use core_async::sync::{watch, CancellationToken};
use core_async::time::{timeout, until_cancelled};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, RecoveryEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct MediaAdapter {
    element: Arc<dyn MediaElement>,
    store: Arc<StateStore>,
    http: Option<Arc<dyn HttpClient>>,
    config: Arc<PlayerConfig>,
    events: EventBus,
    active: Mutex<Option<ActiveSource>>,
    root_token: CancellationToken,
    source_token: Mutex<CancellationToken>,
    /// Bumped on every `seeked` of the current source.
    seek_epoch: watch::Sender<u64>,
}

impl MediaAdapter {
    pub fn new(
        element: Arc<dyn MediaElement>,
        store: Arc<StateStore>,
        http: Option<Arc<dyn HttpClient>>,
        config: Arc<PlayerConfig>,
        events: EventBus,
    ) -> Self {
        let root_token = CancellationToken::new();
        let source_token = root_token.child_token();
        let (seek_epoch, _) = watch::channel(0);

        Self {
            element,
            store,
            http,
            config,
            events,
            active: Mutex::new(None),
            root_token,
            source_token: Mutex::new(source_token),
            seek_epoch,
        }
    }

    // ========================================================================
    // Source lifecycle
    // ========================================================================

    /// Replaces the current source with `url` and starts loading it.
    pub fn load_source(&self, url: &str) -> SourceId {
        let source = self.prepare_source(url);
        self.attach_source(source);
        source
    }

    /// First half of [`load_source`](Self::load_source): cancels the old
    /// source, mints the new id and resets the store, without touching the
    /// element. Lets the player reset its other components before the
    /// element can emit events for the new source.
    pub(crate) fn prepare_source(&self, url: &str) -> SourceId {
        let source = SourceId::new();
        *self.active.lock() = Some(ActiveSource::new(source, url));

        let fresh = self.root_token.child_token();
        let previous = std::mem::replace(&mut *self.source_token.lock(), fresh);
        previous.cancel();

        self.store.reset(source);
        source
    }

    /// Second half of [`load_source`](Self::load_source): assigns the
    /// prepared URL to the element and triggers loading.
    pub(crate) fn attach_source(&self, source: SourceId) {
        let Some(url) = self.url_for(source) else {
            debug!(%source, "Source replaced before it was attached");
            return;
        };

        info!(%source, url = %redact_url(&url), "Loading video source");
        self.events
            .emit(CoreEvent::Playback(PlaybackEvent::SourceLoaded {
                source_id: source.to_string(),
                url: redact_url(&url),
            }))
            .ok();

        self.element.set_source(source, &url);
        self.element.load();
    }

    /// Re-assigns `url` to the element for the *same* source (recovery).
    pub fn reload(&self, source: SourceId, url: &str) -> Result<()> {
        {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(current) if current.id == source => current.current_url = url.to_string(),
                _ => return Err(PlaybackError::StaleSource),
            }
        }

        debug!(%source, url = %redact_url(url), "Reloading video source");
        self.element.set_source(source, url);
        self.element.load();
        Ok(())
    }

    pub fn current_source(&self) -> Option<SourceId> {
        self.active.lock().as_ref().map(|active| active.id)
    }

    pub fn is_current(&self, source: SourceId) -> bool {
        self.current_source() == Some(source)
    }

    /// URL the element currently plays for `source`.
    pub fn url_for(&self, source: SourceId) -> Option<String> {
        self.active
            .lock()
            .as_ref()
            .filter(|active| active.id == source)
            .map(|active| active.current_url.clone())
    }

    /// Cancellation token of the current source.
    pub fn source_token(&self) -> CancellationToken {
        self.source_token.lock().clone()
    }

    /// Cancellation token of `source`, or `StaleSource` if it was replaced.
    pub fn token_for(&self, source: SourceId) -> Result<CancellationToken> {
        // Loads replace the active source before the token, so a matching
        // id after this read means `token` belongs to `source`.
        let token = self.source_token();
        if self.is_current(source) && !token.is_cancelled() {
            Ok(token)
        } else {
            Err(PlaybackError::StaleSource)
        }
    }

    /// Cancels every source-bound operation. Called when the player drops.
    pub fn shutdown(&self) {
        self.root_token.cancel();
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Starts playback. State changes arrive through the native events.
    pub async fn play(&self) -> Result<()> {
        if self.current_source().is_none() {
            return Err(PlaybackError::NoSource);
        }
        self.element.play().await.map_err(PlaybackError::from)
    }

    /// Pauses playback; a no-op when nothing plays.
    pub fn pause(&self) {
        if self.current_source().is_none() || self.element.is_paused() {
            return;
        }
        self.element.pause();
    }

    pub fn is_paused(&self) -> bool {
        self.element.is_paused()
    }

    /// Moves to `time` and waits (bounded) for `seeked`.
    ///
    /// Returns the position actually requested from the element, which is
    /// `time` clamped to `[0, duration]` when the duration is known.
    #[instrument(skip(self))]
    pub async fn seek(&self, time: f64) -> Result<f64> {
        let source = self
            .current_source()
            .ok_or_else(|| PlaybackError::SeekUnavailable("no video source loaded".into()))?;
        if !time.is_finite() {
            return Err(PlaybackError::SeekUnavailable(format!(
                "invalid seek target {time}"
            )));
        }

        let duration = self.duration();
        let target = if duration > 0.0 {
            time.clamp(0.0, duration)
        } else {
            time.max(0.0)
        };

        let mut epoch = self.seek_epoch.subscribe();
        self.element.set_current_time(target);

        if timeout(self.config.seek_settle_timeout, epoch.changed())
            .await
            .is_err()
        {
            debug!(target_time = target, "No seeked event before settle timeout");
        }

        if !self.is_current(source) {
            return Err(PlaybackError::StaleSource);
        }
        Ok(target)
    }

    /// Moves to the start without waiting for `seeked`.
    pub fn rewind(&self) {
        if self.current_source().is_some() {
            self.element.set_current_time(0.0);
        }
    }

    /// Records a `seeked` event of the current source.
    pub fn note_seeked(&self) {
        self.seek_epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }

    /// Native position, never cached.
    pub fn current_time(&self) -> f64 {
        let time = self.element.current_time();
        if time.is_finite() {
            time.max(0.0)
        } else {
            0.0
        }
    }

    /// Native duration, 0 while unknown.
    pub fn duration(&self) -> f64 {
        sanitize_duration(self.element.duration())
    }

    pub fn set_volume(&self, volume: f64) -> Result<()> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        self.element.set_volume(volume);
        Ok(())
    }

    pub fn set_muted(&self, muted: bool) {
        self.element.set_muted(muted);
    }

    // ========================================================================
    // Format negotiation
    // ========================================================================

    /// Whether a `.webm` swap can still be tried for `source`.
    pub fn can_swap_format(&self, source: SourceId) -> bool {
        if !self.config.format_fallback_enabled || self.http.is_none() {
            return false;
        }
        self.active
            .lock()
            .as_ref()
            .filter(|active| active.id == source)
            .map_or(false, |active| {
                !active.format_swap_attempted && webm_sibling(&active.original_url).is_some()
            })
    }

    /// Probes the `.webm` sibling of the source with `HEAD` and switches to
    /// it when it exists. Tried at most once per source.
    ///
    /// Returns `Ok(true)` when the source was swapped.
    #[instrument(skip(self), fields(source = %source))]
    pub async fn try_format_fallback(&self, source: SourceId) -> Result<bool> {
        if !self.config.format_fallback_enabled {
            return Ok(false);
        }
        let Some(http) = self.http.clone() else {
            debug!("No HTTP client, skipping format fallback");
            return Ok(false);
        };

        let original = {
            let mut active = self.active.lock();
            let current = match active.as_mut() {
                Some(current) if current.id == source => current,
                _ => return Err(PlaybackError::StaleSource),
            };
            if current.format_swap_attempted {
                return Ok(false);
            }
            current.format_swap_attempted = true;
            current.original_url.clone()
        };

        let Some(candidate) = webm_sibling(&original) else {
            return Ok(false);
        };

        let token = self.token_for(source)?;
        let probe = timeout(self.config.probe_timeout, http.exists(&candidate));
        let exists = match until_cancelled(&token, probe).await {
            None => return Err(PlaybackError::StaleSource),
            Some(Err(_)) => {
                warn!(url = %redact_url(&candidate), "WebM probe timed out");
                false
            }
            Some(Ok(Err(error))) => {
                warn!(url = %redact_url(&candidate), error = %error, "WebM probe failed");
                false
            }
            Some(Ok(Ok(exists))) => exists,
        };

        if !exists {
            info!(url = %redact_url(&candidate), "No WebM alternative available");
            return Ok(false);
        }

        self.reload(source, &candidate)?;
        info!(url = %redact_url(&candidate), "Switched to WebM alternative");
        self.events
            .emit(CoreEvent::Recovery(RecoveryEvent::FormatSwapped {
                url: redact_url(&candidate),
            }))
            .ok();
        Ok(true)
    }
}
