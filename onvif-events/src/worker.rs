//! Background reactor thread.
//!
//! Spawns a thread with its own single-threaded tokio runtime. The reactor
//! owns every generator, every pull point and every timer; the sync
//! [`NotificationsManager`](crate::NotificationsManager) reaches it only by
//! sending [`Command`]s, which are executed in arrival order.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::encoding::compare_subscription_references;
use crate::error::{EventError, Result};
use crate::generator::EventGenerator;
use crate::manager::ManagerOptions;
use crate::message::{format_utc, NotificationMessage};
use crate::pull_point::{PullMessagesHandler, PullMessagesSink, PullPoint};
use crate::reactor::{AlarmTarget, FiredAlarm, GeneratorId, Scheduler};
use crate::response::{AckResult, PullPointHandle, RenewResponse, RenewResult};
use crate::signal::Connection;
use crate::sink::ResponseSink;

const THREAD_NAME: &str = "onvif-events-reactor";

/// Requests marshaled from request threads onto the reactor.
pub(crate) enum Command {
    CreatePullPoint {
        sink: Box<dyn ResponseSink<PullPointHandle>>,
    },
    PullMessages {
        sink: PullMessagesSink,
        reference: String,
        msg_id: String,
        timeout: Duration,
        msg_limit: usize,
    },
    Renew {
        sink: Box<dyn ResponseSink<RenewResult>>,
        header_to: String,
        header_msg_id: String,
    },
    Unsubscribe {
        sink: Box<dyn ResponseSink<AckResult>>,
        reference: String,
    },
    SetSynchronizationPoint {
        sink: Box<dyn ResponseSink<AckResult>>,
        reference: String,
    },
    /// Stop every generator, terminate every pull point and exit
    Shutdown,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreatePullPoint { .. } => f.write_str("CreatePullPoint"),
            Self::PullMessages {
                reference,
                msg_id,
                timeout,
                msg_limit,
                ..
            } => f
                .debug_struct("PullMessages")
                .field("reference", reference)
                .field("msg_id", msg_id)
                .field("timeout", timeout)
                .field("msg_limit", msg_limit)
                .finish(),
            Self::Renew {
                header_to,
                header_msg_id,
                ..
            } => f
                .debug_struct("Renew")
                .field("header_to", header_to)
                .field("header_msg_id", header_msg_id)
                .finish(),
            Self::Unsubscribe { reference, .. } => f
                .debug_struct("Unsubscribe")
                .field("reference", reference)
                .finish(),
            Self::SetSynchronizationPoint { reference, .. } => f
                .debug_struct("SetSynchronizationPoint")
                .field("reference", reference)
                .finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Spawn the reactor thread and wait until it is servicing commands.
///
/// Every generator is started before this returns.
pub(crate) fn spawn_reactor(
    generators: Vec<EventGenerator>,
    options: ManagerOptions,
    command_rx: mpsc::UnboundedReceiver<Command>,
) -> Result<JoinHandle<()>> {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

    let handle = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create tokio runtime for event reactor: {}", e);
                    let _ = ready_tx.send(Err(EventError::ReactorStart(e.to_string())));
                    return;
                }
            };

            rt.block_on(async move {
                let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
                let mut reactor = Reactor::new(generators, options, Scheduler::new(alarm_tx));
                reactor.start();
                let _ = ready_tx.send(Ok(()));
                reactor.run(command_rx, alarm_rx).await;
            });
        })
        .map_err(|e| EventError::ReactorStart(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            let _ = handle.join();
            Err(EventError::ReactorStart(
                "reactor thread exited during startup".to_string(),
            ))
        }
    }
}

/// A registered pull point plus the generator connections feeding it.
struct Subscriber {
    pull_point: Arc<Mutex<PullPoint>>,
    connections: Vec<Connection>,
}

impl Subscriber {
    fn reference(&self) -> String {
        self.pull_point.lock().subscription_reference().to_string()
    }

    fn teardown(self) {
        for connection in &self.connections {
            connection.disconnect();
        }
        self.pull_point.lock().terminate();
    }
}

struct Reactor {
    generators: Vec<EventGenerator>,
    subscribers: Vec<Subscriber>,
    scheduler: Scheduler,
    options: ManagerOptions,
    next_reference: u64,
}

impl Reactor {
    fn new(generators: Vec<EventGenerator>, options: ManagerOptions, scheduler: Scheduler) -> Self {
        Self {
            generators,
            subscribers: Vec::new(),
            scheduler,
            options,
            next_reference: 0,
        }
    }

    fn start(&mut self) {
        for (index, generator) in self.generators.iter_mut().enumerate() {
            generator.run(GeneratorId(index), &self.scheduler);
        }
        tracing::info!(generators = self.generators.len(), "Event reactor started");
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut alarms: mpsc::UnboundedReceiver<FiredAlarm>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) => {
                        tracing::info!("Event reactor received shutdown command");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!("Command channel closed, shutting down reactor");
                        break;
                    }
                },
                Some(fired) = alarms.recv() => self.handle_alarm(fired),
            }
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!(?command, "Reactor handling command");
        match command {
            Command::CreatePullPoint { sink } => sink.respond(self.create_pull_point()),
            Command::PullMessages {
                sink,
                reference,
                msg_id,
                timeout,
                msg_limit,
            } => self.pull_messages(sink, &reference, msg_id, timeout, msg_limit),
            Command::Renew {
                sink,
                header_to,
                header_msg_id,
            } => sink.respond(self.renew(&header_to, header_msg_id)),
            Command::Unsubscribe { sink, reference } => sink.respond(self.unsubscribe(&reference)),
            Command::SetSynchronizationPoint { sink, reference } => {
                sink.respond(self.set_synchronization_point(&reference))
            }
            Command::Shutdown => {}
        }
    }

    fn handle_alarm(&mut self, fired: FiredAlarm) {
        match fired.target {
            AlarmTarget::Generator(id) => {
                if let Some(generator) = self.generators.get_mut(id.0) {
                    generator.on_alarm(fired.id, &self.scheduler);
                }
            }
            AlarmTarget::PullPoint(reference) => {
                let subscriber = self
                    .subscribers
                    .iter()
                    .find(|subscriber| subscriber.pull_point.lock().subscription_reference() == reference);
                match subscriber {
                    Some(subscriber) => subscriber.pull_point.lock().on_timeout(fired.id),
                    None => tracing::trace!(%reference, "Timeout for removed pull point"),
                }
            }
        }
    }

    fn resolve(&self, reference: &str) -> Result<usize> {
        self.subscribers
            .iter()
            .position(|subscriber| {
                compare_subscription_references(
                    reference,
                    subscriber.pull_point.lock().subscription_reference(),
                )
            })
            .ok_or_else(|| {
                tracing::warn!(%reference, "No pull point matches subscription reference");
                EventError::unknown_subscription(reference)
            })
    }

    fn snapshot(&self) -> Vec<NotificationMessage> {
        self.generators
            .iter()
            .flat_map(EventGenerator::generate_synchronization_event)
            .collect()
    }

    fn create_pull_point(&mut self) -> PullPointHandle {
        let reference = format!("{}/s{}", self.options.subscription_path, self.next_reference);
        self.next_reference += 1;

        let pull_point = Arc::new(Mutex::new(PullPoint::new(
            reference.clone(),
            self.options.pull_point_timeout,
        )));

        // Every generator restarts so the new subscriber sees a full interval
        let mut connections = Vec::with_capacity(self.generators.len());
        for (index, generator) in self.generators.iter_mut().enumerate() {
            generator.stop();
            generator.run(GeneratorId(index), &self.scheduler);

            let target = Arc::clone(&pull_point);
            connections.push(generator.connect(move |message| {
                target.lock().notify(message.clone());
            }));
        }

        if self.options.synchronize_on_subscribe {
            let snapshot = self.snapshot();
            pull_point.lock().notify_all(snapshot);
        }

        let handle = {
            let pull_point = pull_point.lock();
            PullPointHandle {
                subscription_reference: reference.clone(),
                last_renew: pull_point.get_last_renew(),
                termination_time: pull_point.get_termination_time(),
            }
        };

        self.subscribers.push(Subscriber {
            pull_point,
            connections,
        });
        tracing::info!(
            %reference,
            subscribers = self.subscribers.len(),
            "Pull point created"
        );
        handle
    }

    fn pull_messages(
        &mut self,
        sink: PullMessagesSink,
        reference: &str,
        msg_id: String,
        timeout: Duration,
        msg_limit: usize,
    ) {
        let index = match self.resolve(reference) {
            Ok(index) => index,
            Err(e) => return sink.respond(Err(e)),
        };

        tracing::debug!(
            %reference,
            %msg_id,
            requested_timeout_ms = timeout.as_millis() as u64,
            msg_limit,
            "PullMessages"
        );

        let handler: PullMessagesHandler =
            Box::new(move |batch, sink| sink.respond(Ok(batch.into_response(msg_id))));

        let mut pull_point = self.subscribers[index].pull_point.lock();
        pull_point.set_max_messages(msg_limit);
        pull_point.pull_messages(handler, sink, &self.scheduler);
    }

    fn renew(&mut self, header_to: &str, header_msg_id: String) -> RenewResult {
        let index = self.resolve(header_to)?;
        let now = Utc::now();

        let mut pull_point = self.subscribers[index].pull_point.lock();
        pull_point.renew(now);
        tracing::debug!(reference = pull_point.subscription_reference(), "Pull point renewed");

        Ok(RenewResponse {
            subscription_reference: pull_point.subscription_reference().to_string(),
            relates_to: header_msg_id,
            current_time: format_utc(now),
            termination_time: pull_point.get_termination_time(),
        })
    }

    fn unsubscribe(&mut self, reference: &str) -> AckResult {
        let index = self.resolve(reference)?;
        let subscriber = self.subscribers.remove(index);
        let reference = subscriber.reference();
        subscriber.teardown();
        for generator in &mut self.generators {
            generator.prune_connections();
        }

        tracing::info!(
            %reference,
            subscribers = self.subscribers.len(),
            "Pull point unsubscribed"
        );
        Ok(())
    }

    fn set_synchronization_point(&mut self, reference: &str) -> AckResult {
        let index = self.resolve(reference)?;
        let snapshot = self.snapshot();
        tracing::debug!(%reference, count = snapshot.len(), "Synchronization point");
        self.subscribers[index].pull_point.lock().notify_all(snapshot);
        Ok(())
    }

    fn shutdown(&mut self) {
        for generator in &mut self.generators {
            generator.stop();
        }
        let subscribers = std::mem::take(&mut self.subscribers);
        let count = subscribers.len();
        for subscriber in subscribers {
            subscriber.teardown();
        }
        tracing::info!(terminated = count, "Event reactor shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_debug() {
        let (sink, _pending) = crate::sink::PendingResponse::channel();
        let cmd = Command::Unsubscribe {
            sink: Box::new(sink),
            reference: "onvif/event_service/s0".to_string(),
        };
        let rendered = format!("{:?}", cmd);
        assert!(rendered.contains("Unsubscribe"));
        assert!(rendered.contains("onvif/event_service/s0"));
        assert_eq!(format!("{:?}", Command::Shutdown), "Shutdown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_counter_and_sync_snapshot() {
        let (alarm_tx, _alarm_rx) = mpsc::unbounded_channel();
        let generators = vec![EventGenerator::motion_alarm(
            "VS_0",
            Duration::from_secs(1),
            "tns1:VideoSource/MotionAlarm",
        )];
        let mut reactor = Reactor::new(generators, ManagerOptions::default(), Scheduler::new(alarm_tx));
        reactor.start();

        let first = reactor.create_pull_point();
        let second = reactor.create_pull_point();
        assert_eq!(first.subscription_reference, "onvif/event_service/s0");
        assert_eq!(second.subscription_reference, "onvif/event_service/s1");

        // Each pull point starts with the generator's snapshot queued
        let queued = reactor.subscribers[0].pull_point.lock().queued_len();
        assert_eq!(queued, 1);

        assert!(reactor.unsubscribe("onvif/event_service/s0").is_ok());
        assert!(matches!(
            reactor.unsubscribe("onvif/event_service/s0"),
            Err(EventError::UnknownSubscription { .. })
        ));

        reactor.shutdown();
        assert!(reactor.subscribers.is_empty());
        assert!(!reactor.generators[0].is_running());
    }

    fn reactor(generators: Vec<EventGenerator>) -> Reactor {
        let (alarm_tx, _alarm_rx) = mpsc::unbounded_channel();
        let options = ManagerOptions {
            synchronize_on_subscribe: false,
            ..ManagerOptions::default()
        };
        let mut reactor = Reactor::new(generators, options, Scheduler::new(alarm_tx));
        reactor.start();
        reactor
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_disconnects_every_generator() {
        let mut reactor = reactor(vec![
            EventGenerator::motion_alarm("VS_0", Duration::from_secs(1), "tns1:Test"),
            EventGenerator::digital_input(Duration::from_secs(1), "tns1:Test", None),
        ]);

        let first = reactor.create_pull_point();
        reactor.create_pull_point();
        for generator in &reactor.generators {
            assert_eq!(generator.connection_count(), 2);
        }

        reactor.unsubscribe(&first.subscription_reference).unwrap();
        for generator in &reactor.generators {
            assert_eq!(generator.connection_count(), 1);
            assert_eq!(generator.slot_count(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_cycles_release_pull_points() {
        // A generator without devices never publishes, so nothing prunes on emit
        let mut reactor = reactor(vec![EventGenerator::digital_input(
            Duration::from_secs(1),
            "tns1:Test",
            None,
        )]);

        for _ in 0..50 {
            let handle = reactor.create_pull_point();
            reactor.unsubscribe(&handle.subscription_reference).unwrap();
        }

        assert!(reactor.subscribers.is_empty());
        assert_eq!(reactor.generators[0].connection_count(), 0);
        assert_eq!(reactor.generators[0].slot_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_rearms_running_generators() {
        let mut reactor = reactor(vec![EventGenerator::motion_alarm(
            "VS_0",
            Duration::from_secs(1),
            "tns1:Test",
        )]);

        let before = reactor.generators[0].alarm_id().unwrap();
        reactor.create_pull_point();
        let after = reactor.generators[0].alarm_id().unwrap();

        assert_ne!(before, after);
        assert!(reactor.generators[0].is_running());
    }
}
