//! Convenience helpers for wiring the wasm bridge implementations together.
//!
//! Host shells can use [`build_wasm_bridges`] to turn a `<video>` element and
//! an optional resolver callback into the trait objects the engine needs,
//! without writing repetitive glue code.

use std::sync::Arc;

use bridge_traits::{
    error::Result as BridgeResult, HttpClient, MediaElement, VideoSourceResolver,
};
use js_sys::Function;
use web_sys::HtmlVideoElement;

use crate::{http::WasmHttpClient, resolver::JsSourceResolver, video::WasmVideoElement};

/// Configuration for [`build_wasm_bridges`].
#[derive(Debug, Clone, Default)]
pub struct WasmBridgeConfig {
    /// Host callback mapping stored video ids to URLs.
    pub resolver: Option<Function>,
    /// Skip the `fetch` client; disables the alternate-format probe.
    pub disable_http: bool,
}

impl WasmBridgeConfig {
    /// Resolve stored video ids through `callback`.
    pub fn with_resolver(mut self, callback: Function) -> Self {
        self.resolver = Some(callback);
        self
    }

    /// Build without an HTTP client.
    pub fn without_http(mut self) -> Self {
        self.disable_http = true;
        self
    }
}

/// Fully constructed wasm bridge objects ready for injection into the core.
pub struct WasmBridgeSet {
    /// The wrapped `<video>` element.
    pub media_element: Arc<dyn MediaElement>,
    /// HTTP client powered by browser `fetch`.
    pub http_client: Option<Arc<dyn HttpClient>>,
    /// Host-provided video id resolver.
    pub source_resolver: Option<Arc<dyn VideoSourceResolver>>,
}

/// Build the wasm bridge stack around `video`.
pub fn build_wasm_bridges(
    video: HtmlVideoElement,
    config: WasmBridgeConfig,
) -> BridgeResult<WasmBridgeSet> {
    let media_element: Arc<dyn MediaElement> = Arc::new(WasmVideoElement::new(video)?);

    let http_client = if config.disable_http {
        None
    } else {
        Some(Arc::new(WasmHttpClient::new()?) as Arc<dyn HttpClient>)
    };

    let source_resolver = config
        .resolver
        .map(|callback| Arc::new(JsSourceResolver::new(callback)) as Arc<dyn VideoSourceResolver>);

    Ok(WasmBridgeSet {
        media_element,
        http_client,
        source_resolver,
    })
}
