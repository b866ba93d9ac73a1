//! `fetch`-backed [`HttpClient`].
//!
//! The player only probes for `.webm` siblings of failing sources, so the
//! common path is a bodiless `HEAD` that must not be answered from the HTTP
//! cache: a stale 404 would hide a freshly transcoded file. Every request is
//! bounded by an `AbortController`, either with the request's own timeout or
//! the client default.

use crate::error::WasmError;
use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use bytes::Bytes;
use futures::future::{select, Either};
use futures::pin_mut;
use gloo_timers::future::sleep;
use js_sys::{try_iter, Array, Uint8Array};
use std::{collections::HashMap, time::Duration};
use tracing::debug;
use url::Url;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, Headers, Request, RequestCache, RequestInit, RequestMode, Response, Window};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the browser.
pub struct WasmHttpClient {
    window: Window,
    default_timeout: Duration,
}

impl WasmHttpClient {
    /// Binds the client to the current window.
    pub fn new() -> BridgeResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| WasmError::NotAvailable("window".to_string()))?;
        Ok(Self {
            window,
            default_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Timeout for requests that do not carry their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn to_request(request: &HttpRequest, controller: &AbortController) -> Result<Request, WasmError> {
        let init = RequestInit::new();
        init.set_method(request.method.as_str());
        init.set_mode(RequestMode::Cors);
        init.set_cache(RequestCache::NoStore);
        init.set_signal(Some(&controller.signal()));

        if !request.headers.is_empty() {
            let headers = Headers::new()?;
            for (name, value) in &request.headers {
                headers.set(name, value)?;
            }
            init.set_headers(&headers);
        }

        Ok(Request::new_with_str_and_init(&request.url, &init)?)
    }

    /// Runs `fetch`, aborting it once `limit` elapses.
    async fn fetch(
        &self,
        request: &Request,
        controller: &AbortController,
        limit: Duration,
    ) -> BridgeResult<Response> {
        let fetch = JsFuture::from(self.window.fetch_with_request(request));
        let deadline = sleep(limit);
        pin_mut!(fetch);
        pin_mut!(deadline);

        let outcome = match select(fetch, deadline).await {
            Either::Left((outcome, _)) => outcome,
            Either::Right((_, _)) => {
                controller.abort();
                return Err(BridgeError::Timeout(format!(
                    "{} {} after {} ms",
                    request.method(),
                    strip_query(&request.url()),
                    limit.as_millis()
                )));
            }
        };

        let value = outcome.map_err(WasmError::from)?;
        value
            .dyn_into::<Response>()
            .map_err(|_| WasmError::UnexpectedValue("fetch resolved to a non-Response".into()).into())
    }

    async fn body(response: &Response) -> Result<Bytes, WasmError> {
        let buffer = JsFuture::from(response.array_buffer()?).await?;
        Ok(Bytes::from(Uint8Array::new(&buffer).to_vec()))
    }

    fn headers(response: &Response) -> Result<HashMap<String, String>, WasmError> {
        let entries = try_iter(&JsValue::from(response.headers()))?
            .ok_or_else(|| WasmError::UnexpectedValue("Headers is not iterable".into()))?;

        let mut headers = HashMap::new();
        for entry in entries {
            let pair = Array::from(&entry?);
            if let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }
}

#[async_trait(?Send)]
impl HttpClient for WasmHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let controller = AbortController::new().map_err(WasmError::from)?;
        let native = Self::to_request(&request, &controller)?;
        let limit = request.timeout.unwrap_or(self.default_timeout);

        let response = self.fetch(&native, &controller, limit).await?;
        debug!(
            method = request.method.as_str(),
            url = %strip_query(&request.url),
            status = response.status(),
            "fetch completed"
        );

        let body = match request.method {
            HttpMethod::Head => Bytes::new(),
            HttpMethod::Get => Self::body(&response).await?,
        };

        Ok(HttpResponse {
            status: response.status(),
            headers: Self::headers(&response)?,
            body,
        })
    }
}

/// Origin and path only; signed query strings stay out of logs and errors.
fn strip_query(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.into()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
