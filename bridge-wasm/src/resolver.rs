//! `VideoSourceResolver` backed by a JavaScript callback.
//!
//! The host application owns the mapping from stored video ids to playable
//! (often signed) URLs. It hands the engine a function
//! `(videoId: string) => string | Promise<string>`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    VideoSourceResolver,
};
use js_sys::{Function, Promise};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::error::WasmError;

/// Resolves video ids by calling into the host page.
pub struct JsSourceResolver {
    callback: Function,
}

impl JsSourceResolver {
    /// Wrap `callback`, invoked as `callback(videoId)`.
    pub fn new(callback: Function) -> Self {
        Self { callback }
    }
}

#[async_trait(?Send)]
impl VideoSourceResolver for JsSourceResolver {
    async fn resolve(&self, video_id: &str) -> BridgeResult<String> {
        let returned = self
            .callback
            .call1(&JsValue::NULL, &JsValue::from_str(video_id))
            .map_err(WasmError::from)?;

        let value = match returned.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise).await.map_err(WasmError::from)?,
            Err(value) => value,
        };

        match value.as_string() {
            Some(url) if !url.is_empty() => Ok(url),
            Some(_) => Err(BridgeError::NotFound(video_id.to_string())),
            None if value.is_null() || value.is_undefined() => {
                Err(BridgeError::NotFound(video_id.to_string()))
            }
            None => Err(WasmError::UnexpectedValue(format!(
                "resolver returned {value:?} for {video_id}"
            ))
            .into()),
        }
    }
}
