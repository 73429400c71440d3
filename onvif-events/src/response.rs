//! Results handed to response sinks by the notifications manager.

use crate::error::Result;
use crate::message::NotificationMessage;

/// Identity and lease of a freshly created pull point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullPointHandle {
    pub subscription_reference: String,
    /// UTC time the pull point was created
    pub last_renew: String,
    pub termination_time: String,
}

/// Completed long poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullMessagesResponse {
    pub subscription_reference: String,
    /// Message id of the request this answers
    pub relates_to: String,
    pub current_time: String,
    pub termination_time: String,
    pub messages: Vec<NotificationMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewResponse {
    pub subscription_reference: String,
    pub relates_to: String,
    pub current_time: String,
    pub termination_time: String,
}

/// What a sink of a `PullMessages` request receives.
pub type PullMessagesResult = Result<PullMessagesResponse>;

pub type RenewResult = Result<RenewResponse>;

/// Completion of `Unsubscribe` and `SetSynchronizationPoint`.
pub type AckResult = Result<()>;
