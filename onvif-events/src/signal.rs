//! Publish/subscribe list connecting generators to their delivery targets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::message::NotificationMessage;

type Slot = Box<dyn FnMut(&NotificationMessage) + Send>;

/// Owned handle to one connected callback.
///
/// Disconnecting takes effect for every later publish; the callback is
/// dropped the next time the signal emits, connects or is pruned.
#[derive(Debug, Clone)]
pub struct Connection {
    connected: Arc<AtomicBool>,
}

impl Connection {
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Ordered list of callbacks invoked for each published message.
#[derive(Default)]
pub struct Signal {
    slots: Vec<(Arc<AtomicBool>, Slot)>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback; it runs after every callback connected before it.
    pub fn connect<F>(&mut self, callback: F) -> Connection
    where
        F: FnMut(&NotificationMessage) + Send + 'static,
    {
        self.prune();
        let connected = Arc::new(AtomicBool::new(true));
        self.slots.push((Arc::clone(&connected), Box::new(callback)));
        Connection { connected }
    }

    /// Drop the callbacks of disconnected slots.
    pub fn prune(&mut self) {
        self.slots
            .retain(|(connected, _)| connected.load(Ordering::SeqCst));
    }

    /// Invoke every connected callback, in connection order.
    pub fn emit(&mut self, message: &NotificationMessage) {
        self.prune();
        for (connected, slot) in &mut self.slots {
            // A callback may disconnect a later one while we iterate
            if connected.load(Ordering::SeqCst) {
                slot(message);
            }
        }
    }

    /// Number of callbacks still connected.
    pub fn connection_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|(connected, _)| connected.load(Ordering::SeqCst))
            .count()
    }

    /// Number of callbacks held, disconnected ones included.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{PropertyOperation, SimpleItem};
    use std::sync::Mutex;

    fn message(value: &str) -> NotificationMessage {
        NotificationMessage::new(
            "tns1:Test",
            PropertyOperation::Changed,
            vec![SimpleItem::new("Source", "S0")],
            vec![SimpleItem::new("State", value)],
        )
    }

    #[test]
    fn test_emit_in_connection_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut signal = Signal::new();

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            signal.connect(move |m| log.lock().unwrap().push(format!("{name}:{}", m.data_value())));
        }

        signal.emit(&message("true"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:true", "second:true", "third:true"]
        );
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut signal = Signal::new();

        let connection = signal.connect({
            let count = Arc::clone(&count);
            move |_| *count.lock().unwrap() += 1
        });

        signal.emit(&message("true"));
        connection.disconnect();
        assert!(!connection.is_connected());
        signal.emit(&message("false"));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_disconnected_slots_released_without_emit() {
        let target = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut signal = Signal::new();

        for _ in 0..100 {
            let target = Arc::clone(&target);
            let connection = signal.connect(move |m| {
                target.lock().unwrap().push(m.data_value().to_string())
            });
            connection.disconnect();
        }

        // Only the most recent slot is still held until the next prune
        assert_eq!(signal.connection_count(), 0);
        assert_eq!(signal.slot_count(), 1);

        signal.prune();
        assert_eq!(signal.slot_count(), 0);
        assert_eq!(Arc::strong_count(&target), 1);
    }

    #[test]
    fn test_emit_without_connections() {
        let mut signal = Signal::new();
        signal.emit(&message("true"));
        assert_eq!(signal.connection_count(), 0);
    }
}
