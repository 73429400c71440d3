//! Per-subscriber long-poll mailbox.
//!
//! A pull point buffers every message published to it and hands the whole
//! buffer to the next poll. A poll that finds the buffer empty stays
//! outstanding until either a message arrives or the pull point's timeout
//! elapses, whichever comes first; the timeout completes it with an empty
//! batch.
//!
//! At most one poll is outstanding. A newer poll supersedes the older one:
//! the older sink is dropped unanswered, which its waiter observes as
//! [`EventError::ResponseAbandoned`].

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::EventError;
use crate::message::{format_utc, NotificationMessage};
use crate::reactor::{Alarm, AlarmId, AlarmTarget, Scheduler};
use crate::response::{PullMessagesResponse, PullMessagesResult};
use crate::sink::ResponseSink;

/// Default long-poll timeout and lease length.
pub const DEFAULT_TIMEOUT_INTERVAL: Duration = Duration::from_secs(60);

/// Default message limit recorded for a new pull point.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Sink type a poll is answered through.
pub type PullMessagesSink = Box<dyn ResponseSink<PullMessagesResult>>;

/// Turns a flushed batch into the poll's response and writes it to the sink.
pub type PullMessagesHandler = Box<dyn FnOnce(DeliveredBatch, PullMessagesSink) + Send>;

/// Messages flushed to an outstanding poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredBatch {
    pub subscription_reference: String,
    pub messages: Vec<NotificationMessage>,
    pub current_time: String,
    pub termination_time: String,
}

impl DeliveredBatch {
    pub fn into_response(self, relates_to: impl Into<String>) -> PullMessagesResponse {
        PullMessagesResponse {
            subscription_reference: self.subscription_reference,
            relates_to: relates_to.into(),
            current_time: self.current_time,
            termination_time: self.termination_time,
            messages: self.messages,
        }
    }
}

/// An outstanding poll. Handler, sink and timeout come and go together.
struct PendingPoll {
    handler: PullMessagesHandler,
    sink: PullMessagesSink,
    timeout: Option<Alarm>,
}

pub struct PullPoint {
    subscription_reference: String,
    queue: VecDeque<NotificationMessage>,
    pending: Option<PendingPoll>,
    last_renew: DateTime<Utc>,
    timeout_interval: Duration,
    max_messages: usize,
}

impl PullPoint {
    pub fn new(subscription_reference: impl Into<String>, timeout_interval: Duration) -> Self {
        Self {
            subscription_reference: subscription_reference.into(),
            queue: VecDeque::new(),
            pending: None,
            last_renew: Utc::now(),
            timeout_interval,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }

    pub fn subscription_reference(&self) -> &str {
        &self.subscription_reference
    }

    pub fn timeout_interval(&self) -> Duration {
        self.timeout_interval
    }

    /// Register a poll.
    ///
    /// Queued messages are flushed to it immediately; otherwise a timeout is
    /// armed on `scheduler`.
    pub fn pull_messages(
        &mut self,
        handler: PullMessagesHandler,
        sink: PullMessagesSink,
        scheduler: &Scheduler,
    ) {
        if self.pending.take().is_some() {
            tracing::warn!(
                reference = %self.subscription_reference,
                "Superseding outstanding poll; previous caller is abandoned"
            );
        }

        self.pending = Some(PendingPoll {
            handler,
            sink,
            timeout: None,
        });

        if !self.queue.is_empty() {
            self.flush();
            return;
        }

        let alarm = scheduler.arm(
            self.timeout_interval,
            AlarmTarget::PullPoint(self.subscription_reference.clone()),
        );
        if let Some(pending) = self.pending.as_mut() {
            pending.timeout = Some(alarm);
        }
        tracing::debug!(
            reference = %self.subscription_reference,
            timeout_ms = self.timeout_interval.as_millis() as u64,
            "Poll waiting for messages"
        );
    }

    /// Queue a message, flushing to an outstanding poll.
    pub fn notify(&mut self, message: NotificationMessage) {
        self.queue.push_back(message);
        self.flush();
    }

    /// Queue several messages, flushing once.
    pub fn notify_all(&mut self, messages: impl IntoIterator<Item = NotificationMessage>) {
        self.queue.extend(messages);
        if !self.queue.is_empty() {
            self.flush();
        }
    }

    /// Handle a fired timeout alarm. Stale firings are ignored.
    pub fn on_timeout(&mut self, fired: AlarmId) {
        let current = self
            .pending
            .as_ref()
            .and_then(|pending| pending.timeout.as_ref())
            .is_some_and(|alarm| alarm.matches(fired));

        if !current {
            tracing::trace!(%fired, reference = %self.subscription_reference, "Ignoring stale poll timeout");
            return;
        }

        tracing::debug!(reference = %self.subscription_reference, "Poll timed out");
        self.flush();
    }

    /// Hand the whole queue to the outstanding poll, if any.
    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let PendingPoll {
            handler,
            sink,
            timeout,
        } = pending;
        drop(timeout);

        let messages: Vec<NotificationMessage> = std::mem::take(&mut self.queue).into();
        tracing::debug!(
            reference = %self.subscription_reference,
            count = messages.len(),
            "Flushing messages to poll"
        );

        let batch = DeliveredBatch {
            subscription_reference: self.subscription_reference.clone(),
            messages,
            current_time: format_utc(Utc::now()),
            termination_time: self.get_termination_time(),
        };
        handler(batch, sink);
    }

    pub fn get_last_renew(&self) -> String {
        format_utc(self.last_renew)
    }

    pub fn get_termination_time(&self) -> String {
        format_utc(self.termination_instant())
    }

    pub(crate) fn termination_instant(&self) -> DateTime<Utc> {
        let lease = chrono::Duration::from_std(self.timeout_interval)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.last_renew
            .checked_add_signed(lease)
            .unwrap_or(self.last_renew)
    }

    /// Restart the lease at `now`.
    pub fn renew(&mut self, now: DateTime<Utc>) {
        self.last_renew = now;
    }

    /// Record the client's message limit. Flushes still deliver everything.
    pub fn set_max_messages(&mut self, max_messages: usize) {
        self.max_messages = max_messages;
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Tear the pull point down.
    ///
    /// An outstanding poll is answered with
    /// [`EventError::SubscriptionTerminated`]; queued messages are discarded.
    pub fn terminate(&mut self) {
        self.queue.clear();
        if let Some(pending) = self.pending.take() {
            drop(pending.timeout);
            pending.sink.respond(Err(EventError::SubscriptionTerminated {
                reference: self.subscription_reference.clone(),
            }));
        }
    }
}

impl fmt::Debug for PullPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullPoint")
            .field("subscription_reference", &self.subscription_reference)
            .field("queued", &self.queue.len())
            .field("waiting", &self.is_waiting())
            .field("last_renew", &self.last_renew)
            .field("timeout_interval", &self.timeout_interval)
            .field("max_messages", &self.max_messages)
            .finish()
    }
}
