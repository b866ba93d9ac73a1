//! Runtime access for code that runs outside async contexts (tracing layers,
//! host callbacks).

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::runtime::Handle;

/// Drives a future to completion on the current thread.
///
/// Only use for futures that complete without timers or I/O; on wasm a
/// future waiting on the browser event loop never resolves here.
pub use futures::executor::block_on;
