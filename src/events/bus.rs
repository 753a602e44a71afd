//! Fire-and-forget fan-out of arena events

use tokio::sync::broadcast;
use tracing::trace;

use super::protocol::ArenaEvent;

/// Slow subscribers past this many queued events start dropping the oldest
pub const EVENT_BUFFER: usize = 256;

/// Broadcast bus. Subscribers come and go without touching publishers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ArenaEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to whoever is listening; returns the receiver count
    pub fn publish(&self, event: ArenaEvent) -> usize {
        let name = event.name();
        let match_id = event.match_id();
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(event = name, match_id = ?match_id, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}
