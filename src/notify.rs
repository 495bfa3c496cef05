use tokio::sync::broadcast;

use crate::model::BookingEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for committed booking events. The presentation layer
/// subscribes and re-reads its derived lists after each mutation; a lagging
/// subscriber misses events rather than blocking the store.
pub struct NotifyHub {
    tx: broadcast::Sender<BookingEvent>,
}

impl NotifyHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.tx.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: &BookingEvent) {
        let _ = self.tx.send(event.clone());
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}
