//! Error types for the device model.

use thiserror::Error;

/// Errors raised while loading or validating device configuration.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The configuration file could not be read
    #[error("Failed to read device configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for the expected schema
    #[error("Invalid device configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Two devices share the same token
    #[error("Duplicate device token: {0}")]
    DuplicateToken(String),

    /// A device was configured without a token
    #[error("Device token must not be empty")]
    EmptyToken,
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;
