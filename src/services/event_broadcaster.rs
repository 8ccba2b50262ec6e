//! Fan-out of store change notifications.
//!
//! Every [`PushStore`](crate::store::PushStore) owns one broadcaster; views
//! subscribe to it and receive each event stamped with the time it was sent.

use tokio::sync::broadcast;

use crate::models::{StoreEvent, StoreEventMessage};

/// Events a subscriber may fall behind by before it starts lagging.
const CHANNEL_CAPACITY: usize = 1000;

/// Publishes [`StoreEvent`]s to every subscriber of one store.
///
/// Clones share the channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StoreEventMessage>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEventMessage> {
        self.sender.subscribe()
    }

    /// Stamp `event` and publish it. Returns how many subscribers got it;
    /// with none listening the event is dropped.
    pub fn emit(&self, event: StoreEvent) -> usize {
        self.sender
            .send(StoreEventMessage::new(event))
            .unwrap_or_default()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
