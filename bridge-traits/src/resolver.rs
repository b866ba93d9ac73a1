//! Video Source Resolution
//!
//! Stored videos are addressed by an application id. The host turns that id
//! into a playable (usually signed, short-lived) URL.

use crate::{error::Result, platform::PlatformSendSync};

/// Resolves a stored video id into a playable URL.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::resolver::VideoSourceResolver;
///
/// async fn url_for(resolver: &dyn VideoSourceResolver) -> String {
///     resolver.resolve("game-2024-03-14").await.unwrap_or_default()
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait VideoSourceResolver: PlatformSendSync {
    /// Return the URL for `video_id`.
    ///
    /// # Errors
    ///
    /// `BridgeError::NotFound` when the id is unknown, `OperationFailed` for
    /// backend failures.
    async fn resolve(&self, video_id: &str) -> Result<String>;
}
