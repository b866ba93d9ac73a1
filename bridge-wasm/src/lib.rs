//! WebAssembly Bridge Implementations
//!
//! This crate provides WebAssembly implementations of the bridge traits
//! defined in `bridge-traits`, on top of `web-sys` and `wasm-bindgen`.
//!
//! # Platform Support
//!
//! This crate is designed exclusively for the `wasm32-unknown-unknown` target.
//! It will not compile for native targets.
//!
//! # Implementations
//!
//! - `WasmVideoElement`: `MediaElement` over an `HTMLVideoElement`
//! - `WasmHttpClient`: `fetch`-backed `HttpClient` used for `HEAD` probes
//! - `JsSourceResolver`: `VideoSourceResolver` calling a host JS function
//!
//! # Examples
//!
//! ```ignore
//! use bridge_wasm::{build_wasm_bridges, WasmBridgeConfig};
//!
//! let bridges = build_wasm_bridges(video, WasmBridgeConfig::default())?;
//! bridges.media_element.set_source(source, "https://cdn.example.com/game.mp4");
//! ```

#![cfg(target_arch = "wasm32")]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod error;
pub mod http;
pub mod resolver;
pub mod video;

// Re-export commonly used types
pub use bootstrap::{build_wasm_bridges, WasmBridgeConfig, WasmBridgeSet};
pub use error::{WasmError, WasmResult};
pub use http::WasmHttpClient;
pub use resolver::JsSourceResolver;
pub use video::WasmVideoElement;
