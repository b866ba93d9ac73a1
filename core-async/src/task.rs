//! Task spawning abstractions.
//!
//! - On native platforms: `tokio::spawn`; the task must be `Send`
//! - On WASM: `wasm_bindgen_futures::spawn_local` on the page's event loop
//!
//! Engine tasks are fire-and-forget. They observe cancellation tokens
//! instead of being joined, so `spawn` does not hand back a join handle.

use std::future::Future;

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::task::yield_now;

/// Spawns a detached background task.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(future);
}

/// Spawns a detached background task on the browser event loop.
#[cfg(target_arch = "wasm32")]
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Yields once to the browser event loop.
#[cfg(target_arch = "wasm32")]
pub async fn yield_now() {
    gloo_timers::future::TimeoutFuture::new(0).await;
}
