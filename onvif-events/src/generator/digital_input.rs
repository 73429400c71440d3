//! Digital input trigger events.

use onvif_devices::DigitalInputs;

use super::EventSource;
use crate::message::{bool_value, NotificationMessage, PropertyOperation, SimpleItem};

pub const DEFAULT_TOPIC: &str = "tns1:Device/Trigger/DigitalInput";

const SOURCE_NAME: &str = "InputToken";
const DATA_NAME: &str = "LogicalState";

/// Flips the logical state of every enabled input on each tick.
///
/// The device list is owned by the device layer; the source only holds a
/// shared handle to it.
#[derive(Debug, Default)]
pub struct DigitalInputSource {
    inputs: Option<DigitalInputs>,
}

impl DigitalInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_digital_inputs(&mut self, inputs: DigitalInputs) {
        self.inputs = Some(inputs);
    }

    fn message(
        topic: &str,
        operation: PropertyOperation,
        token: &str,
        state: bool,
    ) -> NotificationMessage {
        NotificationMessage::new(
            topic,
            operation,
            vec![SimpleItem::new(SOURCE_NAME, token)],
            vec![SimpleItem::new(DATA_NAME, bool_value(state))],
        )
    }
}

impl EventSource for DigitalInputSource {
    fn kind(&self) -> &'static str {
        "digital_input"
    }

    fn generate_event(&mut self, topic: &str) -> Vec<NotificationMessage> {
        let Some(inputs) = &self.inputs else {
            return Vec::new();
        };

        inputs
            .enabled()
            .iter()
            .map(|input| {
                let state = input.invert_state();
                Self::message(topic, PropertyOperation::Changed, input.token(), state)
            })
            .collect()
    }

    fn synchronization_event(&self, topic: &str) -> Vec<NotificationMessage> {
        let Some(inputs) = &self.inputs else {
            return Vec::new();
        };

        inputs
            .enabled()
            .iter()
            .map(|input| {
                Self::message(
                    topic,
                    PropertyOperation::Initialized,
                    input.token(),
                    input.state(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onvif_devices::DigitalInput;

    fn inputs() -> DigitalInputs {
        vec![
            DigitalInput::new("DI_0"),
            DigitalInput::new("DI_1").with_state(true),
            DigitalInput::new("DI_2").with_enabled(false),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_without_inputs_is_empty() {
        let mut source = DigitalInputSource::new();
        assert!(source.generate_event(DEFAULT_TOPIC).is_empty());
        assert!(source.synchronization_event(DEFAULT_TOPIC).is_empty());
    }

    #[test]
    fn test_tick_inverts_enabled_inputs() {
        let inputs = inputs();
        let mut source = DigitalInputSource::new();
        source.set_digital_inputs(inputs.clone());

        let messages = source.generate_event(DEFAULT_TOPIC);
        assert_eq!(messages.len(), 2);

        assert_eq!(messages[0].topic(), DEFAULT_TOPIC);
        assert_eq!(messages[0].property_operation(), PropertyOperation::Changed);
        assert_eq!(messages[0].source_name(), "InputToken");
        assert_eq!(messages[0].source_value(), "DI_0");
        assert_eq!(messages[0].data_name(), "LogicalState");
        assert_eq!(messages[0].data_value(), "true");

        assert_eq!(messages[1].source_value(), "DI_1");
        assert_eq!(messages[1].data_value(), "false");

        // Device state was flipped in place; the disabled one untouched
        assert!(inputs.get("DI_0").unwrap().state());
        assert!(!inputs.get("DI_1").unwrap().state());
        assert!(!inputs.get("DI_2").unwrap().state());
    }

    #[test]
    fn test_synchronization_reports_current_state() {
        let inputs = inputs();
        let mut source = DigitalInputSource::new();
        source.set_digital_inputs(inputs.clone());

        let snapshot = source.synchronization_event(DEFAULT_TOPIC);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot
            .iter()
            .all(|m| m.property_operation() == PropertyOperation::Initialized));
        assert!(snapshot.iter().all(|m| m.data_name() == "LogicalState"));
        assert_eq!(snapshot[0].data_value(), "false");
        assert_eq!(snapshot[1].data_value(), "true");

        // Snapshots never mutate the devices
        assert!(!inputs.get("DI_0").unwrap().state());
        assert!(inputs.get("DI_1").unwrap().state());
    }
}
