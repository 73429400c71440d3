//! Sync facade over the event reactor.
//!
//! Request handlers call into [`NotificationsManager`] from any thread. Every
//! call is turned into a command for the reactor thread; its result is
//! written to the response sink the caller supplied.

use std::thread::JoinHandle;
use std::time::Duration;

use onvif_devices::DigitalInputs;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::EventsConfig;
use crate::error::{EventError, Result};
use crate::generator::EventGenerator;
use crate::pull_point::DEFAULT_TIMEOUT_INTERVAL;
use crate::response::{AckResult, PullMessagesResult, PullPointHandle, RenewResult};
use crate::sink::{PendingResponse, ResponseSink};
use crate::worker::{spawn_reactor, Command};

/// Default path prefix of subscription references.
pub const DEFAULT_SUBSCRIPTION_PATH: &str = "onvif/event_service";

/// Runtime parameters of the notifications manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Long-poll timeout and lease length of every pull point
    pub pull_point_timeout: Duration,
    /// Path prefix of subscription references, without surrounding slashes
    pub subscription_path: String,
    /// Queue a state snapshot on every new pull point
    pub synchronize_on_subscribe: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            pull_point_timeout: DEFAULT_TIMEOUT_INTERVAL,
            subscription_path: DEFAULT_SUBSCRIPTION_PATH.to_string(),
            synchronize_on_subscribe: true,
        }
    }
}

/// Links event generators, pull points and clients.
///
/// Generators are registered first, then [`run`](Self::run) starts the
/// reactor thread. The request entry points take `&self`, so a running
/// manager can be shared behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use onvif_events::{EventGenerator, NotificationsManager, ManagerOptions, PendingResponse};
///
/// let mut manager = NotificationsManager::new(ManagerOptions::default());
/// manager.add_generator(EventGenerator::motion_alarm(
///     "VS_0",
///     Duration::from_secs(5),
///     "tns1:VideoSource/MotionAlarm",
/// ))?;
/// manager.run()?;
///
/// let handle = manager.create_pull_point()?.wait()?;
///
/// let (sink, pending) = PendingResponse::channel();
/// manager.pull_messages(sink, &handle.subscription_reference, "urn:uuid:1", Duration::from_secs(10), 10)?;
/// let response = pending.wait()??;
/// println!("{} messages", response.messages.len());
/// # Ok::<(), onvif_events::EventError>(())
/// ```
pub struct NotificationsManager {
    options: ManagerOptions,
    /// Generators waiting for `run()`; moved to the reactor on start
    generators: Mutex<Vec<EventGenerator>>,
    command_tx: Option<mpsc::UnboundedSender<Command>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationsManager {
    pub fn new(options: ManagerOptions) -> Self {
        Self {
            options,
            generators: Mutex::new(Vec::new()),
            command_tx: None,
            worker: Mutex::new(None),
        }
    }

    /// Build a manager and its generators from configuration.
    ///
    /// `inputs` feeds every digital input generator; without it those
    /// generators stay silent.
    pub fn from_config(config: &EventsConfig, inputs: Option<&DigitalInputs>) -> Result<Self> {
        config.validate()?;
        let mut manager = Self::new(config.manager_options());
        for generator in config.build_generators(inputs) {
            manager.add_generator(generator)?;
        }
        Ok(manager)
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Register a generator. Only allowed before [`run`](Self::run).
    pub fn add_generator(&mut self, generator: EventGenerator) -> Result<()> {
        if self.is_running() {
            return Err(EventError::AlreadyRunning);
        }
        tracing::debug!(kind = generator.kind(), topic = generator.topic(), "Adding generator");
        self.generators.get_mut().push(generator);
        Ok(())
    }

    pub fn generator_count(&self) -> usize {
        self.generators.lock().len()
    }

    /// Whether the reactor has been started.
    pub fn is_running(&self) -> bool {
        self.command_tx.is_some()
    }

    /// Start the reactor thread and every registered generator.
    ///
    /// Returns once the reactor is servicing commands.
    pub fn run(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(EventError::AlreadyRunning);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let generators = std::mem::take(self.generators.get_mut());
        let worker = spawn_reactor(generators, self.options.clone(), command_rx)?;

        self.command_tx = Some(command_tx);
        *self.worker.lock() = Some(worker);

        tracing::info!(
            path = %self.options.subscription_path,
            timeout_secs = self.options.pull_point_timeout.as_secs(),
            "NotificationsManager is running"
        );
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .as_ref()
            .ok_or(EventError::NotRunning)?
            .send(command)
            .map_err(|_| EventError::ReactorUnavailable)
    }

    /// Create a pull point subscription.
    pub fn create_pull_point(&self) -> Result<PendingResponse<PullPointHandle>> {
        let (sink, pending) = PendingResponse::channel();
        self.send(Command::CreatePullPoint {
            sink: Box::new(sink),
        })?;
        Ok(pending)
    }

    /// Long-poll the pull point addressed by `subscription_reference`.
    ///
    /// `timeout` and `msg_limit` are recorded but do not bound the poll; the
    /// pull point's own timeout does. An unknown reference completes the sink
    /// with [`EventError::UnknownSubscription`].
    ///
    /// On `Err` the sink is dropped without a response.
    pub fn pull_messages<S>(
        &self,
        sink: S,
        subscription_reference: impl Into<String>,
        msg_id: impl Into<String>,
        timeout: Duration,
        msg_limit: usize,
    ) -> Result<()>
    where
        S: ResponseSink<PullMessagesResult>,
    {
        self.send(Command::PullMessages {
            sink: Box::new(sink),
            reference: subscription_reference.into(),
            msg_id: msg_id.into(),
            timeout,
            msg_limit,
        })
    }

    /// Extend the lease of the pull point addressed by `header_to`.
    pub fn renew<S>(
        &self,
        sink: S,
        header_to: impl Into<String>,
        header_msg_id: impl Into<String>,
    ) -> Result<()>
    where
        S: ResponseSink<RenewResult>,
    {
        self.send(Command::Renew {
            sink: Box::new(sink),
            header_to: header_to.into(),
            header_msg_id: header_msg_id.into(),
        })
    }

    /// Remove a pull point. A poll outstanding on it is answered with
    /// [`EventError::SubscriptionTerminated`].
    pub fn unsubscribe<S>(&self, sink: S, subscription_reference: impl Into<String>) -> Result<()>
    where
        S: ResponseSink<AckResult>,
    {
        self.send(Command::Unsubscribe {
            sink: Box::new(sink),
            reference: subscription_reference.into(),
        })
    }

    /// Queue the current state of every generator on a pull point.
    pub fn set_synchronization_point<S>(
        &self,
        sink: S,
        subscription_reference: impl Into<String>,
    ) -> Result<()>
    where
        S: ResponseSink<AckResult>,
    {
        self.send(Command::SetSynchronizationPoint {
            sink: Box::new(sink),
            reference: subscription_reference.into(),
        })
    }

    /// Stop the reactor and wait for its thread to exit.
    ///
    /// Called automatically on drop. Safe to call more than once.
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        if let Some(command_tx) = &self.command_tx {
            let _ = command_tx.send(Command::Shutdown);
        }

        if worker.thread().id() == std::thread::current().id() {
            tracing::warn!("Shutdown requested from the reactor thread; not joining");
            return;
        }
        if worker.join().is_err() {
            tracing::error!("Event reactor thread panicked");
        }
    }
}

impl Drop for NotificationsManager {
    fn drop(&mut self) {
        tracing::debug!("NotificationsManager dropping");
        self.shutdown();
    }
}

impl std::fmt::Debug for NotificationsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationsManager")
            .field("options", &self.options)
            .field("pending_generators", &self.generators.lock().len())
            .field("running", &self.is_running())
            .finish()
    }
}
