//! Runtime-agnostic async abstraction layer for the Courtside video engine.
//!
//! The playback engine runs natively on Tokio (hosts and the test suite) and
//! inside the browser on the page's event loop. This crate hides that split:
//!
//! - Native platforms: Tokio timers, `tokio::spawn`
//! - WebAssembly: `gloo-timers`, `performance.now()`, `spawn_local`
//!
//! All core-* crates depend on this crate instead of reaching for tokio's
//! runtime directly.
//!
//! # Modules
//!
//! - `task`: fire-and-forget task spawning
//! - `time`: sleep, timeout, `Instant`, cancellable sleeps
//! - `sync`: channels and the `CancellationToken`
//! - `runtime`: handle access and `block_on` for synchronous callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep_or_cancel, Duration};
//!
//! async fn auto_stop(token: CancellationToken) {
//!     if sleep_or_cancel(&token, Duration::from_secs(4)).await {
//!         // the timer fired against a live session
//!     }
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
