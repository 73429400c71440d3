//! Rule-engine audio detection events.

use super::{EventSource, Toggle};
use crate::message::{bool_value, NotificationMessage, PropertyOperation, SimpleItem};

pub const DEFAULT_TOPIC: &str = "tns1:AudioAnalytics/Audio/DetectedSound";
pub const DEFAULT_DATA_ITEM: &str = "IsSoundDetected";

/// Audio detection rule on one audio analytics configuration.
#[derive(Debug)]
pub struct AudioDetectionSource {
    source_configuration_token: String,
    analytics_configuration_token: String,
    rule: String,
    data_item_name: String,
    state: Toggle,
}

impl AudioDetectionSource {
    pub fn new(
        source_configuration_token: impl Into<String>,
        analytics_configuration_token: impl Into<String>,
        rule: impl Into<String>,
        data_item_name: impl Into<String>,
    ) -> Self {
        Self {
            source_configuration_token: source_configuration_token.into(),
            analytics_configuration_token: analytics_configuration_token.into(),
            rule: rule.into(),
            data_item_name: data_item_name.into(),
            state: Toggle::default(),
        }
    }

    fn message(&self, topic: &str, operation: PropertyOperation, state: bool) -> NotificationMessage {
        NotificationMessage::new(
            topic,
            operation,
            vec![
                SimpleItem::new("AudioSourceConfigurationToken", &self.source_configuration_token),
                SimpleItem::new(
                    "AudioAnalyticsConfigurationToken",
                    &self.analytics_configuration_token,
                ),
                SimpleItem::new("Rule", &self.rule),
            ],
            vec![SimpleItem::new(&self.data_item_name, bool_value(state))],
        )
    }
}

impl EventSource for AudioDetectionSource {
    fn kind(&self) -> &'static str {
        "audio_detection"
    }

    fn generate_event(&mut self, topic: &str) -> Vec<NotificationMessage> {
        let state = self.state.invert();
        vec![self.message(topic, PropertyOperation::Changed, state)]
    }

    fn synchronization_event(&self, topic: &str) -> Vec<NotificationMessage> {
        vec![self.message(topic, PropertyOperation::Initialized, self.state.get())]
    }
}
