//! Timer scheduling on the reactor thread.
//!
//! Every timer in the subsystem (generator ticks and long-poll timeouts) is an
//! [`Alarm`]: a sleeping task on the reactor's runtime that, when it wakes,
//! posts a [`FiredAlarm`] back into the reactor loop. The owner of the alarm
//! acts on the firing only if its id matches the alarm it currently holds, so
//! a canceled or superseded alarm can never trigger its callback, even when
//! its firing was already queued.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Unique id of one armed alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmId(u64);

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alarm-{}", self.0)
    }
}

/// Index of a generator in the reactor's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneratorId(pub usize);

/// What an alarm belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmTarget {
    /// Recurring tick of a generator
    Generator(GeneratorId),
    /// Long-poll timeout of the pull point with this subscription reference
    PullPoint(String),
}

/// Notification posted to the reactor when an alarm's delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAlarm {
    pub id: AlarmId,
    pub target: AlarmTarget,
}

/// An armed timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct Alarm {
    id: AlarmId,
    task: JoinHandle<()>,
}

impl Alarm {
    pub fn id(&self) -> AlarmId {
        self.id
    }

    /// Whether this alarm is the one that fired.
    pub fn matches(&self, fired: AlarmId) -> bool {
        self.id == fired
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Handle used by generators and pull points to arm alarms.
///
/// The scheduler keeps a sender to the reactor's alarm channel for as long as
/// the reactor lives, so that channel never closes while no timers are armed.
#[derive(Debug)]
pub struct Scheduler {
    alarm_tx: mpsc::UnboundedSender<FiredAlarm>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new(alarm_tx: mpsc::UnboundedSender<FiredAlarm>) -> Self {
        Self {
            alarm_tx,
            next_id: AtomicU64::new(0),
        }
    }

    /// Arm a one-shot alarm that fires after `delay`.
    ///
    /// Must be called from within the reactor's runtime.
    pub fn arm(&self, delay: Duration, target: AlarmTarget) -> Alarm {
        let id = AlarmId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let alarm_tx = self.alarm_tx.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The reactor is gone if the send fails; nothing left to notify
            let _ = alarm_tx.send(FiredAlarm { id, target });
        });

        Alarm { id, task }
    }
}
