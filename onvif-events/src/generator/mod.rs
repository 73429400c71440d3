//! Timer-driven event generators.
//!
//! An [`EventGenerator`] holds the bookkeeping every generator shares: the
//! tick interval, the topic, the armed alarm and the list of connected
//! delivery callbacks. What a tick actually produces is delegated to an
//! [`EventSource`]; one source exists per emulated event kind.
//!
//! Generators live on the reactor thread. [`EventGenerator::run`] arms the
//! first alarm and every matching firing routed back through
//! [`EventGenerator::on_alarm`] runs one tick, publishes its messages and
//! re-arms.

use std::fmt;
use std::time::Duration;

use onvif_devices::DigitalInputs;

use crate::message::NotificationMessage;
use crate::reactor::{Alarm, AlarmId, AlarmTarget, GeneratorId, Scheduler};
use crate::signal::{Connection, Signal};

pub mod audio_detection;
pub mod cell_motion;
pub mod digital_input;
pub mod motion_alarm;

pub use audio_detection::AudioDetectionSource;
pub use cell_motion::CellMotionSource;
pub use digital_input::DigitalInputSource;
pub use motion_alarm::MotionAlarmSource;

/// Shortest tick interval a generator accepts. Shorter intervals are raised
/// to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Variant-specific tick logic of a generator.
pub trait EventSource: Send {
    /// Short name used in logs.
    fn kind(&self) -> &'static str;

    /// Advance the source state by one tick and return the `Changed`
    /// messages describing the change.
    fn generate_event(&mut self, topic: &str) -> Vec<NotificationMessage>;

    /// `Initialized` messages describing the current state. Must not change
    /// the state.
    fn synchronization_event(&self, topic: &str) -> Vec<NotificationMessage>;
}

/// Boolean state flipped on every tick by the toggling sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Toggle(bool);

impl Toggle {
    pub(crate) fn get(self) -> bool {
        self.0
    }

    /// Flip and return the new value.
    pub(crate) fn invert(&mut self) -> bool {
        self.0 = !self.0;
        self.0
    }
}

/// A recurring producer of notification messages.
pub struct EventGenerator {
    interval: Duration,
    topic: String,
    source: Box<dyn EventSource>,
    signal: Signal,
    alarm: Option<Alarm>,
    id: Option<GeneratorId>,
}

impl EventGenerator {
    /// Build a generator around `source`.
    ///
    /// An interval below [`MIN_INTERVAL`] is raised to it.
    pub fn new(interval: Duration, topic: impl Into<String>, source: Box<dyn EventSource>) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(
                kind = source.kind(),
                requested_ms = interval.as_millis() as u64,
                "Generator interval below minimum, using {:?}",
                MIN_INTERVAL
            );
        }
        Self {
            interval: interval.max(MIN_INTERVAL),
            topic: topic.into(),
            source,
            signal: Signal::new(),
            alarm: None,
            id: None,
        }
    }

    /// Generator flipping every enabled digital input on each tick.
    ///
    /// Without a device list the generator produces nothing.
    pub fn digital_input(
        interval: Duration,
        topic: impl Into<String>,
        inputs: Option<DigitalInputs>,
    ) -> Self {
        let mut source = DigitalInputSource::new();
        if let Some(inputs) = inputs {
            source.set_digital_inputs(inputs);
        }
        Self::new(interval, topic, Box::new(source))
    }

    pub fn motion_alarm(
        source_token: impl Into<String>,
        interval: Duration,
        topic: impl Into<String>,
    ) -> Self {
        Self::new(interval, topic, Box::new(MotionAlarmSource::new(source_token)))
    }

    pub fn cell_motion(
        video_source_configuration_token: impl Into<String>,
        video_analytics_configuration_token: impl Into<String>,
        rule: impl Into<String>,
        data_item_name: impl Into<String>,
        interval: Duration,
        topic: impl Into<String>,
    ) -> Self {
        let source = CellMotionSource::new(
            video_source_configuration_token,
            video_analytics_configuration_token,
            rule,
            data_item_name,
        );
        Self::new(interval, topic, Box::new(source))
    }

    pub fn audio_detection(
        audio_source_configuration_token: impl Into<String>,
        audio_analytics_configuration_token: impl Into<String>,
        rule: impl Into<String>,
        data_item_name: impl Into<String>,
        interval: Duration,
        topic: impl Into<String>,
    ) -> Self {
        let source = AudioDetectionSource::new(
            audio_source_configuration_token,
            audio_analytics_configuration_token,
            rule,
            data_item_name,
        );
        Self::new(interval, topic, Box::new(source))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }

    /// Whether a tick is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.alarm.is_some()
    }

    /// Start ticking. Replaces any pending alarm.
    pub fn run(&mut self, id: GeneratorId, scheduler: &Scheduler) {
        self.id = Some(id);
        self.schedule_next_alarm(id, scheduler);
        tracing::debug!(
            generator = id.0,
            kind = self.kind(),
            interval_ms = self.interval.as_millis() as u64,
            "Generator started"
        );
    }

    /// Cancel the pending alarm. No tick fires afterwards until `run` is
    /// called again.
    pub fn stop(&mut self) {
        if self.alarm.take().is_some() {
            tracing::debug!(kind = self.kind(), "Generator stopped");
        }
    }

    /// Register a delivery callback.
    pub fn connect<F>(&mut self, callback: F) -> Connection
    where
        F: FnMut(&NotificationMessage) + Send + 'static,
    {
        self.signal.connect(callback)
    }

    /// Deliver a message to every connected callback.
    pub fn publish(&mut self, message: &NotificationMessage) {
        self.signal.emit(message);
    }

    pub fn connection_count(&self) -> usize {
        self.signal.connection_count()
    }

    /// Release the callbacks of disconnected connections.
    pub fn prune_connections(&mut self) {
        self.signal.prune();
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.signal.slot_count()
    }

    #[cfg(test)]
    pub(crate) fn alarm_id(&self) -> Option<AlarmId> {
        self.alarm.as_ref().map(Alarm::id)
    }

    /// Snapshot of the current source state as `Initialized` messages.
    pub fn generate_synchronization_event(&self) -> Vec<NotificationMessage> {
        self.source.synchronization_event(&self.topic)
    }

    /// Handle a fired alarm addressed to this generator.
    ///
    /// Firings of canceled or replaced alarms are ignored.
    pub(crate) fn on_alarm(&mut self, fired: AlarmId, scheduler: &Scheduler) {
        let (Some(alarm), Some(id)) = (&self.alarm, self.id) else {
            tracing::trace!(%fired, "Ignoring alarm for stopped generator");
            return;
        };
        if !alarm.matches(fired) {
            tracing::trace!(%fired, "Ignoring stale generator alarm");
            return;
        }

        self.tick();
        self.schedule_next_alarm(id, scheduler);
    }

    fn tick(&mut self) {
        let messages = self.source.generate_event(&self.topic);
        tracing::debug!(
            kind = self.source.kind(),
            count = messages.len(),
            "Generator tick"
        );
        for message in &messages {
            self.signal.emit(message);
        }
    }

    fn schedule_next_alarm(&mut self, id: GeneratorId, scheduler: &Scheduler) {
        self.alarm = Some(scheduler.arm(self.interval, AlarmTarget::Generator(id)));
    }
}

impl fmt::Debug for EventGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGenerator")
            .field("kind", &self.source.kind())
            .field("interval", &self.interval)
            .field("topic", &self.topic)
            .field("running", &self.is_running())
            .field("signal", &self.signal)
            .finish()
    }
}
