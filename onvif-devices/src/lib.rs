//! # onvif-devices
//!
//! Physical device model for the ONVIF camera emulator.
//!
//! The device/media configuration layer owns these objects and mutates them.
//! Event generators only hold a shared [`DigitalInputs`] handle and read
//! the devices (flipping a device's logical state is the one write they do).
//!
//! ```rust
//! use onvif_devices::{DigitalInput, DigitalInputs};
//!
//! let inputs = DigitalInputs::new();
//! inputs.push(DigitalInput::new("DI_0"));
//! inputs.push(DigitalInput::new("DI_1").with_enabled(false));
//!
//! assert_eq!(inputs.len(), 2);
//! assert_eq!(inputs.enabled().len(), 1);
//! ```

pub mod config;
pub mod digital_input;
pub mod error;

pub use config::{DeviceConfig, DigitalInputConfig};
pub use digital_input::{DigitalInput, DigitalInputs};
pub use error::{DeviceError, Result};
