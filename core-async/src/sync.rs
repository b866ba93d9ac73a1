//! Synchronization primitives.
//!
//! Tokio's channel types do not depend on its runtime, so the same
//! `watch`/`broadcast`/`Notify` types are used on both targets. The
//! `CancellationToken` comes from `tokio-util` on both targets as well.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! let (tx, rx) = watch::channel(0u32);
//! tx.send_replace(1);
//! assert_eq!(*rx.borrow(), 1);
//!
//! let parent = CancellationToken::new();
//! let child = parent.child_token();
//! parent.cancel();
//! assert!(child.is_cancelled());
//! ```

pub use tokio::sync::{broadcast, oneshot, watch, Notify};
pub use tokio_util::sync::CancellationToken;
