//! # Host Bridge Traits
//!
//! Capability contracts the playback engine requires from its host.
//!
//! ## Overview
//!
//! The engine never touches a browser API directly. Each trait here is a
//! capability that must be implemented per host: `bridge-wasm` wires them to
//! `web-sys` in the browser, and tests wire them to recording fakes or
//! `mockall` mocks.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaElement`](media::MediaElement) - Native video element commands and reads
//! - [`MediaEventSink`](media::MediaEventSink) - Receiver of native media events
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - `HEAD` probes for alternate formats
//! - [`VideoSourceResolver`](resolver::VideoSourceResolver) - Video id to URL
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Web      | `bridge-wasm`       | ✅ Shipping |
//! | Tests    | in-crate fakes      | ✅ Shipping |
//!
//! ## Fail-Fast Strategy
//!
//! `MediaElement` is mandatory. `core_runtime::config::CoreConfigBuilder`
//! refuses to build without one and reports `CapabilityMissing`. The other
//! bridges are optional and their features degrade (no format fallback without
//! an `HttpClient`, no `load_video` without a `VideoSourceResolver`).
//!
//! ## Thread Safety
//!
//! On native targets every bridge is `Send + Sync` so it can be shared across
//! Tokio tasks. On `wasm32` the bounds are dropped, see [`platform`].

pub mod error;
pub mod http;
pub mod logging;
pub mod media;
pub mod platform;
pub mod resolver;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    MediaElement, MediaErrorKind, MediaEvent, MediaEventEnvelope, MediaEventSink,
    NativeMediaError, PlayRejection, SourceId,
};
pub use platform::{PlatformSend, PlatformSendSync};
pub use resolver::VideoSourceResolver;
