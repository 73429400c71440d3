//! Digital input devices and the shared list handle handed to event generators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// A single digital input (relay/contact) of the emulated camera.
///
/// The enabled flag and the logical state are atomics so the configuration
/// layer can change them while the event reactor reads them.
#[derive(Debug)]
pub struct DigitalInput {
    token: String,
    enabled: AtomicBool,
    state: AtomicBool,
}

impl DigitalInput {
    /// Create an enabled input with logical state `false`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            enabled: AtomicBool::new(true),
            state: AtomicBool::new(false),
        }
    }

    /// Set the initial enabled flag.
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::SeqCst);
        self
    }

    /// Set the initial logical state.
    pub fn with_state(self, state: bool) -> Self {
        self.state.store(state, Ordering::SeqCst);
        self
    }

    /// The input's configuration token.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Current logical state.
    pub fn state(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    pub fn set_state(&self, state: bool) {
        self.state.store(state, Ordering::SeqCst);
    }

    /// Flip the logical state and return the new value.
    pub fn invert_state(&self) -> bool {
        !self.state.fetch_xor(true, Ordering::SeqCst)
    }
}

/// Shared, cloneable handle to the configured digital inputs.
///
/// Clones point at the same list. Reads take a snapshot under a read lock, so
/// a generator iterating the inputs never observes a half-applied update.
#[derive(Debug, Clone, Default)]
pub struct DigitalInputs {
    inner: Arc<RwLock<Vec<Arc<DigitalInput>>>>,
}

impl DigitalInputs {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input.
    pub fn push(&self, input: DigitalInput) {
        tracing::debug!(token = input.token(), "Registering digital input");
        self.inner.write().push(Arc::new(input));
    }

    /// Remove the input with the given token, returning it if present.
    pub fn remove(&self, token: &str) -> Option<Arc<DigitalInput>> {
        let mut inputs = self.inner.write();
        let index = inputs.iter().position(|input| input.token() == token)?;
        Some(inputs.remove(index))
    }

    /// Look up an input by token.
    pub fn get(&self, token: &str) -> Option<Arc<DigitalInput>> {
        self.inner
            .read()
            .iter()
            .find(|input| input.token() == token)
            .cloned()
    }

    /// Snapshot of every input in configuration order.
    pub fn snapshot(&self) -> Vec<Arc<DigitalInput>> {
        self.inner.read().clone()
    }

    /// Snapshot of the enabled inputs in configuration order.
    pub fn enabled(&self) -> Vec<Arc<DigitalInput>> {
        self.inner
            .read()
            .iter()
            .filter(|input| input.is_enabled())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl FromIterator<DigitalInput> for DigitalInputs {
    fn from_iter<I: IntoIterator<Item = DigitalInput>>(iter: I) -> Self {
        let inputs = iter.into_iter().map(Arc::new).collect();
        Self {
            inner: Arc::new(RwLock::new(inputs)),
        }
    }
}
