//! # Core Configuration Module
//!
//! Holds the host bridges the playback engine is built from.
//!
//! ## Overview
//!
//! A builder assembles a [`CoreConfig`] and fails fast when a required bridge
//! is missing, so misconfiguration surfaces at construction rather than on
//! the first user click.
//!
//! ## Required Dependencies
//!
//! - `MediaElement` - the native video element
//!
//! ## Optional Dependencies
//!
//! - `HttpClient` - `HEAD` probes for the `.webm` fallback (disabled without it)
//! - `VideoSourceResolver` - resolves stored video ids (`load_video`)
//! - `LoggerSink` - mirrors engine logs into the host pipeline
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_element(Arc::new(WasmVideoElement::new(video)?))
//!     .http_client(Arc::new(WasmHttpClient::new()?))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No media element: the builder reports CapabilityMissing.
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing media element");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, LoggerSink, MediaElement, VideoSourceResolver};
use std::sync::Arc;

/// Largest accepted event bus buffer.
pub const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Core configuration for the playback engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Native video element (required)
    pub media_element: Arc<dyn MediaElement>,

    /// HTTP client for alternate-format probes (optional)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Video id to URL resolver (optional)
    pub source_resolver: Option<Arc<dyn VideoSourceResolver>>,

    /// Host log sink (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Capacity of the engine event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_element", &"MediaElement { ... }")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "source_resolver",
                &self
                    .source_resolver
                    .as_ref()
                    .map(|_| "VideoSourceResolver { ... }"),
            )
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn media_element_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaElement".to_string(),
        message: "A MediaElement implementation is required to play video. \
                 Web: wrap the page's <video> element with bridge_wasm::WasmVideoElement. \
                 Tests: inject a recording fake."
            .to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_element: Option<Arc<dyn MediaElement>>,
    http_client: Option<Arc<dyn HttpClient>>,
    source_resolver: Option<Arc<dyn VideoSourceResolver>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the native video element (required).
    pub fn media_element(mut self, element: Arc<dyn MediaElement>) -> Self {
        self.media_element = Some(element);
        self
    }

    /// Sets the HTTP client used for `.webm` probes.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the resolver used by `load_video`.
    pub fn source_resolver(mut self, resolver: Arc<dyn VideoSourceResolver>) -> Self {
        self.source_resolver = Some(resolver);
        self
    }

    /// Sets the host log sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Sets the event bus capacity (default: [`DEFAULT_EVENT_BUFFER_SIZE`]).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when no `MediaElement` was provided
    /// - `Config` when the event buffer size is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let media_element = self.media_element.ok_or_else(media_element_missing_error)?;

        let config = CoreConfig {
            media_element,
            http_client: self.http_client,
            source_resolver: self.source_resolver,
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
