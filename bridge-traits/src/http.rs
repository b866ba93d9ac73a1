//! HTTP Client Abstraction
//!
//! The engine only needs HTTP for cheap existence checks: before swapping a
//! failing `.mp4`/`.mov` source for its `.webm` sibling it issues a `HEAD`
//! request through this bridge. Hosts may still route every request through
//! their own networking stack (auth headers, signed URLs, proxies).

use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use crate::{error::Result, platform::PlatformSendSync};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    /// Shorthand for a `HEAD` request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Async HTTP client trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn has_webm(client: &dyn HttpClient, url: &str) -> bool {
///     client.exists(url).await.unwrap_or(false)
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait HttpClient: PlatformSendSync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails or the request times out. Non-2xx
    /// statuses are returned as responses, not errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Issue a `HEAD` request and report whether the resource exists.
    async fn exists(&self, url: &str) -> Result<bool> {
        let response = self.execute(HttpRequest::head(url)).await?;
        Ok(response.is_success())
    }
}
