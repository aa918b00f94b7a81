//! Broadcast bus for [`SyncEvent`]s.

use sync_core::SyncEvent;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Cloneable handle to the event channel.
///
/// Emitting with no subscribers is not an error; slow subscribers lag and
/// miss the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Emit an event.
    pub fn emit(&self, event: SyncEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }
}
