//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback engine:
//! - Logging and tracing setup
//! - Bridge configuration (`CoreConfig`)
//! - Engine event bus
//!
//! ## Overview
//!
//! `core-playback` builds a player from a [`config::CoreConfig`], publishes
//! lifecycle events on an [`events::EventBus`], and logs through `tracing`
//! with the subscriber installed by [`logging::init_logging`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
