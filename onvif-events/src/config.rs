//! JSON configuration of the event service.
//!
//! ```json
//! {
//!   "pull_point_timeout_secs": 60,
//!   "subscription_path": "onvif/event_service",
//!   "generators": [
//!     { "type": "digital_input", "interval_secs": 10 },
//!     { "type": "motion_alarm", "source_token": "VS_0", "interval_secs": 5 },
//!     {
//!       "type": "cell_motion",
//!       "video_source_configuration_token": "VSC_0",
//!       "video_analytics_configuration_token": "VAC_0",
//!       "rule": "MyMotionDetectorRule"
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use onvif_devices::DigitalInputs;
use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};
use crate::generator::{audio_detection, cell_motion, digital_input, motion_alarm, EventGenerator};
use crate::manager::{ManagerOptions, DEFAULT_SUBSCRIPTION_PATH};

const DEFAULT_INTERVAL_SECS: u64 = 10;

fn default_timeout_secs() -> u64 {
    60
}

fn default_subscription_path() -> String {
    DEFAULT_SUBSCRIPTION_PATH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Event service section of the emulator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Long-poll timeout and lease length, in seconds
    #[serde(default = "default_timeout_secs")]
    pub pull_point_timeout_secs: u64,

    /// Path prefix of subscription references
    #[serde(default = "default_subscription_path")]
    pub subscription_path: String,

    /// Queue a state snapshot on every new pull point
    #[serde(default = "default_true")]
    pub synchronize_on_subscribe: bool,

    #[serde(default)]
    pub generators: Vec<GeneratorConfig>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            pull_point_timeout_secs: default_timeout_secs(),
            subscription_path: default_subscription_path(),
            synchronize_on_subscribe: true,
            generators: Vec::new(),
        }
    }
}

/// One configured generator. `topic` falls back to the variant's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratorConfig {
    DigitalInput {
        #[serde(default = "default_interval_secs")]
        interval_secs: u64,
        #[serde(default)]
        topic: Option<String>,
    },
    MotionAlarm {
        source_token: String,
        #[serde(default = "default_interval_secs")]
        interval_secs: u64,
        #[serde(default)]
        topic: Option<String>,
    },
    CellMotion {
        video_source_configuration_token: String,
        video_analytics_configuration_token: String,
        rule: String,
        #[serde(default)]
        data_item_name: Option<String>,
        #[serde(default = "default_interval_secs")]
        interval_secs: u64,
        #[serde(default)]
        topic: Option<String>,
    },
    AudioDetection {
        audio_source_configuration_token: String,
        audio_analytics_configuration_token: String,
        rule: String,
        #[serde(default)]
        data_item_name: Option<String>,
        #[serde(default = "default_interval_secs")]
        interval_secs: u64,
        #[serde(default)]
        topic: Option<String>,
    },
}

impl GeneratorConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DigitalInput { .. } => "digital_input",
            Self::MotionAlarm { .. } => "motion_alarm",
            Self::CellMotion { .. } => "cell_motion",
            Self::AudioDetection { .. } => "audio_detection",
        }
    }

    pub fn interval(&self) -> Duration {
        let secs = match self {
            Self::DigitalInput { interval_secs, .. }
            | Self::MotionAlarm { interval_secs, .. }
            | Self::CellMotion { interval_secs, .. }
            | Self::AudioDetection { interval_secs, .. } => *interval_secs,
        };
        Duration::from_secs(secs)
    }

    /// Configured topic, or the variant's default.
    pub fn topic(&self) -> &str {
        let (topic, default) = match self {
            Self::DigitalInput { topic, .. } => (topic, digital_input::DEFAULT_TOPIC),
            Self::MotionAlarm { topic, .. } => (topic, motion_alarm::DEFAULT_TOPIC),
            Self::CellMotion { topic, .. } => (topic, cell_motion::DEFAULT_TOPIC),
            Self::AudioDetection { topic, .. } => (topic, audio_detection::DEFAULT_TOPIC),
        };
        topic.as_deref().unwrap_or(default)
    }

    fn tokens(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::DigitalInput { .. } => Vec::new(),
            Self::MotionAlarm { source_token, .. } => vec![("source_token", source_token.as_str())],
            Self::CellMotion {
                video_source_configuration_token,
                video_analytics_configuration_token,
                rule,
                ..
            } => vec![
                ("video_source_configuration_token", video_source_configuration_token.as_str()),
                ("video_analytics_configuration_token", video_analytics_configuration_token.as_str()),
                ("rule", rule.as_str()),
            ],
            Self::AudioDetection {
                audio_source_configuration_token,
                audio_analytics_configuration_token,
                rule,
                ..
            } => vec![
                ("audio_source_configuration_token", audio_source_configuration_token.as_str()),
                ("audio_analytics_configuration_token", audio_analytics_configuration_token.as_str()),
                ("rule", rule.as_str()),
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval().is_zero() {
            return Err(EventError::Configuration(format!(
                "{} generator interval must be greater than zero",
                self.kind()
            )));
        }
        if self.topic().is_empty() {
            return Err(EventError::Configuration(format!(
                "{} generator topic must not be empty",
                self.kind()
            )));
        }
        for (field, value) in self.tokens() {
            if value.is_empty() {
                return Err(EventError::Configuration(format!(
                    "{} generator {} must not be empty",
                    self.kind(),
                    field
                )));
            }
        }
        Ok(())
    }

    /// Build the generator. `inputs` is only used by digital input generators.
    pub fn build(&self, inputs: Option<&DigitalInputs>) -> EventGenerator {
        let interval = self.interval();
        let topic = self.topic().to_string();

        match self {
            Self::DigitalInput { .. } => {
                EventGenerator::digital_input(interval, topic, inputs.cloned())
            }
            Self::MotionAlarm { source_token, .. } => {
                EventGenerator::motion_alarm(source_token.clone(), interval, topic)
            }
            Self::CellMotion {
                video_source_configuration_token,
                video_analytics_configuration_token,
                rule,
                data_item_name,
                ..
            } => EventGenerator::cell_motion(
                video_source_configuration_token.clone(),
                video_analytics_configuration_token.clone(),
                rule.clone(),
                data_item_name
                    .clone()
                    .unwrap_or_else(|| cell_motion::DEFAULT_DATA_ITEM.to_string()),
                interval,
                topic,
            ),
            Self::AudioDetection {
                audio_source_configuration_token,
                audio_analytics_configuration_token,
                rule,
                data_item_name,
                ..
            } => EventGenerator::audio_detection(
                audio_source_configuration_token.clone(),
                audio_analytics_configuration_token.clone(),
                rule.clone(),
                data_item_name
                    .clone()
                    .unwrap_or_else(|| audio_detection::DEFAULT_DATA_ITEM.to_string()),
                interval,
                topic,
            ),
        }
    }
}

impl EventsConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pull_point_timeout_secs == 0 {
            return Err(EventError::Configuration(
                "pull_point_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.subscription_path.trim_matches('/').is_empty() {
            return Err(EventError::Configuration(
                "subscription_path must not be empty".to_string(),
            ));
        }
        for generator in &self.generators {
            generator.validate()?;
        }
        Ok(())
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            pull_point_timeout: Duration::from_secs(self.pull_point_timeout_secs),
            subscription_path: self.subscription_path.trim_matches('/').to_string(),
            synchronize_on_subscribe: self.synchronize_on_subscribe,
        }
    }

    /// Build every configured generator in configuration order.
    pub fn build_generators(&self, inputs: Option<&DigitalInputs>) -> Vec<EventGenerator> {
        self.generators
            .iter()
            .map(|generator| generator.build(inputs))
            .collect()
    }
}
