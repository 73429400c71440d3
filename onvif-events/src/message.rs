//! Notification message value type.

use std::fmt;

use chrono::{DateTime, Utc};

/// Format used for every UTC timestamp on the wire, e.g. `2024-03-01T10:15:30Z`.
pub const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Render a UTC instant the way the event service reports times.
pub fn format_utc(time: DateTime<Utc>) -> String {
    time.format(UTC_FORMAT).to_string()
}

/// Current UTC time in wire format.
pub fn utc_now() -> String {
    format_utc(Utc::now())
}

/// Whether a message reports the initial state or a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyOperation {
    /// Snapshot of the current state, sent to bootstrap a subscriber
    Initialized,
    /// The property changed
    Changed,
}

impl PropertyOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "Initialized",
            Self::Changed => "Changed",
        }
    }
}

impl fmt::Display for PropertyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name/value pair in the source or data section of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleItem {
    pub name: String,
    pub value: String,
}

impl SimpleItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One event produced by a generator.
///
/// Messages are immutable once built. The first source item and the first
/// data item are the primary identifiers; rule-engine events carry
/// additional source items (configuration tokens and rule name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    topic: String,
    utc_time: String,
    property_operation: PropertyOperation,
    source: Vec<SimpleItem>,
    data: Vec<SimpleItem>,
}

impl NotificationMessage {
    /// Build a message stamped with the current UTC time.
    pub fn new(
        topic: impl Into<String>,
        property_operation: PropertyOperation,
        source: Vec<SimpleItem>,
        data: Vec<SimpleItem>,
    ) -> Self {
        Self::with_time(topic, utc_now(), property_operation, source, data)
    }

    /// Build a message with an explicit timestamp.
    pub fn with_time(
        topic: impl Into<String>,
        utc_time: impl Into<String>,
        property_operation: PropertyOperation,
        source: Vec<SimpleItem>,
        data: Vec<SimpleItem>,
    ) -> Self {
        Self {
            topic: topic.into(),
            utc_time: utc_time.into(),
            property_operation,
            source,
            data,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn utc_time(&self) -> &str {
        &self.utc_time
    }

    pub fn property_operation(&self) -> PropertyOperation {
        self.property_operation
    }

    pub fn source(&self) -> &[SimpleItem] {
        &self.source
    }

    pub fn data(&self) -> &[SimpleItem] {
        &self.data
    }

    pub fn source_name(&self) -> &str {
        self.source.first().map_or("", |item| item.name.as_str())
    }

    pub fn source_value(&self) -> &str {
        self.source.first().map_or("", |item| item.value.as_str())
    }

    pub fn data_name(&self) -> &str {
        self.data.first().map_or("", |item| item.name.as_str())
    }

    pub fn data_value(&self) -> &str {
        self.data.first().map_or("", |item| item.value.as_str())
    }
}

/// Render a boolean state as the event service does.
pub(crate) fn bool_value(state: bool) -> &'static str {
    if state {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_utc() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap();
        assert_eq!(format_utc(time), "2024-03-01T10:15:30Z");
    }

    #[test]
    fn test_property_operation_display() {
        assert_eq!(PropertyOperation::Initialized.to_string(), "Initialized");
        assert_eq!(PropertyOperation::Changed.to_string(), "Changed");
    }

    #[test]
    fn test_primary_items() {
        let message = NotificationMessage::new(
            "tns1:RuleEngine/CellMotionDetector/Motion",
            PropertyOperation::Changed,
            vec![
                SimpleItem::new("VideoSourceConfigurationToken", "VSC_0"),
                SimpleItem::new("VideoAnalyticsConfigurationToken", "VAC_0"),
                SimpleItem::new("Rule", "MyMotionDetectorRule"),
            ],
            vec![SimpleItem::new("IsMotion", "true")],
        );

        assert_eq!(message.source_name(), "VideoSourceConfigurationToken");
        assert_eq!(message.source_value(), "VSC_0");
        assert_eq!(message.data_name(), "IsMotion");
        assert_eq!(message.data_value(), "true");
        assert_eq!(message.source().len(), 3);
        assert!(message.utc_time().ends_with('Z'));
    }

    #[test]
    fn test_empty_items_have_empty_accessors() {
        let message = NotificationMessage::with_time(
            "tns1:Test",
            "2024-01-01T00:00:00Z",
            PropertyOperation::Initialized,
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(message.source_name(), "");
        assert_eq!(message.data_value(), "");
        assert_eq!(message.utc_time(), "2024-01-01T00:00:00Z");
    }
}
