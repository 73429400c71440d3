//! JSON configuration for the emulated camera's physical devices.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::digital_input::{DigitalInput, DigitalInputs};
use crate::error::{DeviceError, Result};

/// Device section of the emulator configuration.
///
/// ```json
/// {
///   "digital_inputs": [
///     { "token": "DI_0" },
///     { "token": "DI_1", "enabled": false, "initial_state": true }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub digital_inputs: Vec<DigitalInputConfig>,
}

/// One configured digital input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalInputConfig {
    pub token: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub initial_state: bool,
}

fn default_enabled() -> bool {
    true
}

impl DeviceConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Check that every token is non-empty and unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for input in &self.digital_inputs {
            if input.token.is_empty() {
                return Err(DeviceError::EmptyToken);
            }
            if !seen.insert(input.token.as_str()) {
                return Err(DeviceError::DuplicateToken(input.token.clone()));
            }
        }
        Ok(())
    }

    /// Build the live device list from this configuration.
    pub fn digital_inputs(&self) -> DigitalInputs {
        self.digital_inputs
            .iter()
            .map(|input| {
                DigitalInput::new(input.token.clone())
                    .with_enabled(input.enabled)
                    .with_state(input.initial_state)
            })
            .collect()
    }
}
