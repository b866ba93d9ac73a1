//! Platform-specific helper abstractions used to keep trait bounds aligned with
//! the threading guarantees of each target.
//!
//! Native targets require `Send + Sync` so bridge implementations can be shared
//! across Tokio tasks. WebAssembly builds run on the page's single thread and
//! wrap `web_sys` handles that cannot satisfy those bounds, so the markers
//! below become no-ops there.

/// Marker trait that applies `Send + Sync` on native targets while becoming a
/// no-op on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync + ?Sized {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> PlatformSendSync for T {}

/// Marker trait equivalent to `Send` on native targets.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSend: Send {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSend for T where T: Send + ?Sized {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSend {}

#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> PlatformSend for T {}
