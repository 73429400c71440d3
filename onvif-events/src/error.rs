//! Error types for the onvif-events crate.

use thiserror::Error;

/// Errors produced by the notification subsystem.
///
/// `UnknownSubscription` and `SubscriptionTerminated` are client-visible and
/// are mapped to wire faults by [`crate::encoding::fault_subcode`]. Timer
/// cancellation never shows up here; canceled alarms are dropped silently.
#[derive(Debug, Error)]
pub enum EventError {
    /// The reference does not resolve to a registered pull point
    #[error("Unknown subscription: {reference}")]
    UnknownSubscription { reference: String },

    /// The pull point was removed while a poll was outstanding
    #[error("Subscription terminated: {reference}")]
    SubscriptionTerminated { reference: String },

    /// The response sink was dropped without being completed
    #[error("Response was abandoned before completion")]
    ResponseAbandoned,

    /// An operation that needs the reactor was called before `run()`
    #[error("Notifications manager is not running")]
    NotRunning,

    /// `run()` or `add_generator()` was called after the reactor started
    #[error("Notifications manager is already running")]
    AlreadyRunning,

    /// The reactor thread has exited and no longer accepts commands
    #[error("Event reactor is no longer available")]
    ReactorUnavailable,

    /// The reactor thread or its runtime failed to start
    #[error("Failed to start event reactor: {0}")]
    ReactorStart(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON for the expected schema
    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    /// An XML tree could not be written
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Device configuration error
    #[error("Device error: {0}")]
    Device(#[from] onvif_devices::DeviceError),
}

impl EventError {
    pub(crate) fn unknown_subscription(reference: impl Into<String>) -> Self {
        Self::UnknownSubscription {
            reference: reference.into(),
        }
    }

    /// Whether the error should be reported to the client as a fault rather
    /// than as an internal server error.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::UnknownSubscription { .. } | Self::SubscriptionTerminated { .. }
        )
    }
}

/// Convenience type alias for Results using EventError.
pub type Result<T> = std::result::Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_error_display() {
        let error = EventError::unknown_subscription("onvif/event_service/s7");
        assert_eq!(
            error.to_string(),
            "Unknown subscription: onvif/event_service/s7"
        );

        let error = EventError::SubscriptionTerminated {
            reference: "onvif/event_service/s0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Subscription terminated: onvif/event_service/s0"
        );

        assert_eq!(
            EventError::NotRunning.to_string(),
            "Notifications manager is not running"
        );
        assert_eq!(
            EventError::ReactorStart("no threads".to_string()).to_string(),
            "Failed to start event reactor: no threads"
        );
    }

    #[test]
    fn test_client_fault_classification() {
        assert!(EventError::unknown_subscription("x").is_client_fault());
        assert!(EventError::SubscriptionTerminated {
            reference: "x".to_string()
        }
        .is_client_fault());
        assert!(!EventError::ResponseAbandoned.is_client_fault());
        assert!(!EventError::ReactorUnavailable.is_client_fault());
    }

    #[test]
    fn test_device_error_conversion() {
        let device_error = onvif_devices::DeviceError::EmptyToken;
        let error: EventError = device_error.into();
        assert!(matches!(error, EventError::Device(_)));
    }
}
