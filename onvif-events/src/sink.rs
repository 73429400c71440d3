//! Write-once response sinks.
//!
//! The HTTP layer hands the manager a sink for every request whose answer may
//! arrive later (a long poll in particular). The reactor completes each sink at
//! most once; a sink that is dropped instead is an abandoned request.

use tokio::sync::oneshot;

use crate::error::{EventError, Result};

/// Destination for the eventual response to one request.
///
/// `respond` consumes the sink, so a response can only be written once.
///
/// `respond` runs on the reactor thread, inside its tokio runtime and with
/// the addressed pull point locked. It must return promptly: calling
/// [`PendingResponse::wait`] there panics the reactor, and blocking on
/// another manager request deadlocks it. Hand the response off to another
/// thread or task instead.
pub trait ResponseSink<T>: Send + 'static {
    fn respond(self: Box<Self>, response: T);
}

impl<T: Send + 'static> ResponseSink<T> for oneshot::Sender<T> {
    fn respond(self: Box<Self>, response: T) {
        if (*self).send(response).is_err() {
            tracing::debug!("Response receiver dropped before completion");
        }
    }
}

/// Sink that calls a closure with the response.
pub struct FnSink<F>(F);

/// Wrap a closure as a [`ResponseSink`].
///
/// The closure runs on the reactor thread under the same restrictions as
/// [`ResponseSink::respond`]: it must not block, call
/// [`PendingResponse::wait`], or wait on the manager.
pub fn sink_fn<T, F>(f: F) -> FnSink<F>
where
    F: FnOnce(T) + Send + 'static,
{
    FnSink(f)
}

impl<T, F> ResponseSink<T> for FnSink<F>
where
    F: FnOnce(T) + Send + 'static,
{
    fn respond(self: Box<Self>, response: T) {
        (self.0)(response)
    }
}

/// Receiving half of a one-shot sink.
///
/// Synchronous callers use [`wait`](Self::wait); async request handlers use
/// [`recv`](Self::recv) so an outstanding long poll does not hold a thread.
#[derive(Debug)]
pub struct PendingResponse<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> PendingResponse<T> {
    /// Create a connected sink/pending pair.
    pub fn channel() -> (oneshot::Sender<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Block until the response arrives.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<T> {
        self.rx
            .blocking_recv()
            .map_err(|_| EventError::ResponseAbandoned)
    }

    /// Wait asynchronously for the response.
    pub async fn recv(self) -> Result<T> {
        self.rx.await.map_err(|_| EventError::ResponseAbandoned)
    }

    /// Check for a response without waiting.
    ///
    /// Returns `Ok(None)` while the request is still pending.
    pub fn try_recv(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(EventError::ResponseAbandoned),
        }
    }
}
