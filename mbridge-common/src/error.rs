//! Common error types for mbridge

use thiserror::Error;

/// Common result type for mbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the media bridge and address search
#[derive(Error, Debug)]
pub enum Error {
    /// Correlation identity could not be derived (asset not yet persisted)
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Remote address lookup failed (transport, HTTP status, response body
    /// or a panicking lookup task)
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected caller input (empty asset identifier, unknown media handle,
    /// unknown suggestion kind)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error (channel closed, task gone)
    #[error("Internal error: {0}")]
    Internal(String),
}
