//! # onvif-events
//!
//! Event notification subsystem of the ONVIF camera emulator: timer-driven
//! event generators, pull point subscriptions and long-poll delivery.
//!
//! ## Overview
//!
//! Generators (digital inputs, motion alarm, cell motion, audio detection)
//! tick on their own intervals and publish [`NotificationMessage`]s to every
//! connected pull point. A client creates a pull point, then polls it; a poll
//! returns queued messages at once, or waits until a message arrives or the
//! pull point's timeout elapses.
//!
//! ## Architecture
//!
//! [`NotificationsManager`] is a sync facade. Generators, pull points and
//! timers all live on one reactor thread running a single-threaded tokio
//! runtime; request threads reach it through a command channel and get
//! their answers through write-once [`ResponseSink`]s. No registry or queue
//! is ever touched from two threads.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use onvif_events::prelude::*;
//!
//! let mut manager = NotificationsManager::new(ManagerOptions::default());
//! manager.add_generator(EventGenerator::motion_alarm(
//!     "VS_0",
//!     Duration::from_secs(5),
//!     "tns1:VideoSource/MotionAlarm",
//! ))?;
//! manager.run()?;
//!
//! let handle = manager.create_pull_point()?.wait()?;
//! let (sink, pending) = PendingResponse::channel();
//! manager.pull_messages(sink, &handle.subscription_reference, "urn:uuid:1", Duration::from_secs(60), 50)?;
//!
//! for message in pending.wait()??.messages {
//!     println!("{} {}={}", message.topic(), message.data_name(), message.data_value());
//! }
//! # Ok::<(), EventError>(())
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod generator;
pub mod logging;
pub mod manager;
pub mod message;
pub mod pull_point;
pub mod reactor;
pub mod response;
pub mod signal;
pub mod sink;
mod worker;

// Re-export main types for convenience
pub use config::{EventsConfig, GeneratorConfig};
pub use error::{EventError, Result};
pub use generator::{EventGenerator, EventSource};
pub use manager::{ManagerOptions, NotificationsManager};
pub use message::{NotificationMessage, PropertyOperation, SimpleItem};
pub use pull_point::{DeliveredBatch, PullPoint};
pub use response::{
    AckResult, PullMessagesResponse, PullMessagesResult, PullPointHandle, RenewResponse,
    RenewResult,
};
pub use sink::{sink_fn, PendingResponse, ResponseSink};

// Re-export the device list handed to digital input generators
pub use onvif_devices::DigitalInputs;

/// Prelude module for convenient imports
///
/// ```rust
/// use onvif_events::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DigitalInputs, EventError, EventGenerator, EventsConfig, ManagerOptions,
        NotificationMessage, NotificationsManager, PendingResponse, PropertyOperation,
        PullMessagesResponse, PullPointHandle, RenewResponse, ResponseSink, Result,
    };
}
