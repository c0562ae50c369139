//! Device error types.

use lockshadow_core::TransportError;
use thiserror::Error;

/// Errors that can occur in the device runtime.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport session error
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operating system error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
