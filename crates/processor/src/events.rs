//! In-process event bus for karma notifications

use common::KarmaEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Fan-out of karma events to any number of subscribers.
///
/// Publishing never fails: with no subscribers the event is dropped, and
/// a subscriber that falls more than `capacity` events behind skips ahead.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KarmaEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: KarmaEvent) {
        debug!("Publishing {} for {}", event.name(), event.user_id());
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KarmaEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
