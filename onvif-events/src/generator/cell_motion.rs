//! Rule-engine cell motion detector events.

use super::{EventSource, Toggle};
use crate::message::{bool_value, NotificationMessage, PropertyOperation, SimpleItem};

pub const DEFAULT_TOPIC: &str = "tns1:RuleEngine/CellMotionDetector/Motion";
pub const DEFAULT_DATA_ITEM: &str = "IsMotion";

/// Cell motion rule on one video analytics configuration.
#[derive(Debug)]
pub struct CellMotionSource {
    video_source_configuration_token: String,
    video_analytics_configuration_token: String,
    rule: String,
    data_item_name: String,
    state: Toggle,
}

impl CellMotionSource {
    pub fn new(
        video_source_configuration_token: impl Into<String>,
        video_analytics_configuration_token: impl Into<String>,
        rule: impl Into<String>,
        data_item_name: impl Into<String>,
    ) -> Self {
        Self {
            video_source_configuration_token: video_source_configuration_token.into(),
            video_analytics_configuration_token: video_analytics_configuration_token.into(),
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
                SimpleItem::new(
                    "VideoSourceConfigurationToken",
                    &self.video_source_configuration_token,
                ),
                SimpleItem::new(
                    "VideoAnalyticsConfigurationToken",
                    &self.video_analytics_configuration_token,
                ),
                SimpleItem::new("Rule", &self.rule),
            ],
            vec![SimpleItem::new(&self.data_item_name, bool_value(state))],
        )
    }
}

impl EventSource for CellMotionSource {
    fn kind(&self) -> &'static str {
        "cell_motion"
    }

    fn generate_event(&mut self, topic: &str) -> Vec<NotificationMessage> {
        let state = self.state.invert();
        vec![self.message(topic, PropertyOperation::Changed, state)]
    }

    fn synchronization_event(&self, topic: &str) -> Vec<NotificationMessage> {
        vec![self.message(topic, PropertyOperation::Initialized, self.state.get())]
    }
}
