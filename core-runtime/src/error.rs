use thiserror::Error;

/// Errors raised while assembling the runtime around a player.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A host bridge the requested operation depends on was not provided.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A global tracing subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    LoggingInstalled(String),
}

pub type Result<T> = std::result::Result<T, Error>;
