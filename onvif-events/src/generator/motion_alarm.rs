//! Video source motion alarm events.

use super::{EventSource, Toggle};
use crate::message::{bool_value, NotificationMessage, PropertyOperation, SimpleItem};

pub const DEFAULT_TOPIC: &str = "tns1:VideoSource/MotionAlarm";

/// Single video source whose motion state alternates on each tick.
#[derive(Debug)]
pub struct MotionAlarmSource {
    source_token: String,
    state: Toggle,
}

impl MotionAlarmSource {
    pub fn new(source_token: impl Into<String>) -> Self {
        Self {
            source_token: source_token.into(),
            state: Toggle::default(),
        }
    }

    fn message(&self, topic: &str, operation: PropertyOperation, state: bool) -> NotificationMessage {
        NotificationMessage::new(
            topic,
            operation,
            vec![SimpleItem::new("Source", &self.source_token)],
            vec![SimpleItem::new("State", bool_value(state))],
        )
    }
}

impl EventSource for MotionAlarmSource {
    fn kind(&self) -> &'static str {
        "motion_alarm"
    }

    fn generate_event(&mut self, topic: &str) -> Vec<NotificationMessage> {
        let state = self.state.invert();
        vec![self.message(topic, PropertyOperation::Changed, state)]
    }

    fn synchronization_event(&self, topic: &str) -> Vec<NotificationMessage> {
        vec![self.message(topic, PropertyOperation::Initialized, self.state.get())]
    }
}
