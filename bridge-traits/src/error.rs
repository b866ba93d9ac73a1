use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Bridge operation timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
