//! Workspace facade crate.
//!
//! Re-exports the playback engine and its runtime so host applications can
//! depend on `courtside` alone. The `wasm` feature forwards to
//! `core-playback/wasm`, which exposes the `JsVideoPlayer` binding.

pub use core_playback as playback;
pub use core_runtime as runtime;

pub use core_playback::{PlaybackError, PlayerConfig, VideoPlayer};
