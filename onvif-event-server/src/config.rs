//! Server configuration file.

use std::path::Path;

use onvif_devices::{DeviceConfig, DigitalInputs};
use onvif_events::{EventsConfig, NotificationsManager, Result};
use serde::{Deserialize, Serialize};

/// Top-level emulator configuration.
///
/// ```json
/// {
///   "devices": { "digital_inputs": [{ "token": "DI_0" }] },
///   "events": {
///     "generators": [
///       { "type": "digital_input", "interval_secs": 10 },
///       { "type": "motion_alarm", "source_token": "VS_0", "interval_secs": 5 }
///     ]
///   }
/// }
/// ```
///
/// Both sections may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub devices: DeviceConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.devices.validate()?;
        self.events.validate()
    }

    /// Build the device list and a manager wired to it. The manager is not
    /// started.
    pub fn build(&self) -> Result<(DigitalInputs, NotificationsManager)> {
        let inputs = self.devices.digital_inputs();
        let manager = NotificationsManager::from_config(&self.events, Some(&inputs))?;
        Ok((inputs, manager))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ServerConfig::from_json_str("{}").unwrap();
        assert!(config.devices.digital_inputs.is_empty());
        assert_eq!(config.events.pull_point_timeout_secs, 60);
    }

    #[test]
    fn test_build_wires_generators() {
        let config = ServerConfig::from_json_str(
            r#"{
                "devices": { "digital_inputs": [{ "token": "DI_0" }, { "token": "DI_1" }] },
                "events": { "generators": [{ "type": "digital_input" }] }
            }"#,
        )
        .unwrap();

        let (inputs, manager) = config.build().unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(manager.generator_count(), 1);
        assert!(!manager.is_running());
    }

    #[test]
    fn test_duplicate_device_token_rejected() {
        let result = ServerConfig::from_json_str(
            r#"{ "devices": { "digital_inputs": [{ "token": "DI_0" }, { "token": "DI_0" }] } }"#,
        );
        assert!(result.is_err());
    }
}
