use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{BusinessId, Event};

const CHANNEL_CAPACITY: usize = 256;

/// Per-business broadcast of applied store events. Open slot views subscribe
/// and recompute when a commitment lands or hours change.
pub struct NotifyHub {
    channels: DashMap<BusinessId, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a business. Creates the channel if needed.
    pub fn subscribe(&self, business_id: BusinessId) -> broadcast::Receiver<Event> {
        self.channels
            .entry(business_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send a notification. No-op if nobody is listening; a channel whose
    /// receivers are all gone is dropped.
    pub fn send(&self, business_id: BusinessId, event: &Event) {
        let closed = match self.channels.get(&business_id) {
            Some(sender) => sender.send(event.clone()).is_err(),
            None => return,
        };
        if closed {
            self.channels
                .remove_if(&business_id, |_, sender| sender.receiver_count() == 0);
        }
    }

    pub fn listener_count(&self, business_id: BusinessId) -> usize {
        self.channels
            .get(&business_id)
            .map_or(0, |sender| sender.receiver_count())
    }
}
