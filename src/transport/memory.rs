//! In-process transport: every tile in one process shares one hub.

use tokio::sync::mpsc;
use uuid::Uuid;

use super::hub::Hub;
use super::{Delivery, Transport, TransportError};
use crate::message::Message;

/// A bus many tiles attach to. Clones share the same channels.
#[derive(Clone, Default)]
pub struct MemoryBus {
    hub: Hub,
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new tile. The receiver yields everything published on the
    /// channels the endpoint subscribes to.
    #[must_use]
    pub fn endpoint(&self) -> (MemoryEndpoint, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.hub.register(tx);
        (MemoryEndpoint { hub: self.hub.clone(), id }, rx)
    }

    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.hub
    }
}

/// One tile's handle on a [`MemoryBus`]. Leaves every channel when dropped.
pub struct MemoryEndpoint {
    hub: Hub,
    id: Uuid,
}

impl Transport for MemoryEndpoint {
    fn publish(&self, channel: &str, message: &Message) -> Result<(), TransportError> {
        let payload = message.encode()?;
        self.hub.publish(channel, &payload);
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.hub.subscribe(self.id, channel);
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.hub.unsubscribe(self.id, channel);
        Ok(())
    }

    fn close(&self, channel: &str) -> Result<(), TransportError> {
        self.hub.close_channel(channel);
        Ok(())
    }
}

impl Drop for MemoryEndpoint {
    fn drop(&mut self) {
        self.hub.remove_subscriber(self.id);
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
