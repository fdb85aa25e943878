//! Channel-name to subscriber fan-out registry.
//!
//! DESIGN
//! ======
//! A subscriber is an unbounded sender of [`Delivery`] registered under a
//! fresh id. A channel exists while it has at least one subscriber; it is
//! created by the first subscribe and removed when the last subscriber
//! leaves or someone closes it. Publishing clones the payload into every
//! subscriber queue in subscribe order, so delivery per channel is ordered
//! per subscriber. Subscribers whose receiver has been dropped are pruned
//! on the publish that discovers them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::Delivery;

#[derive(Default)]
struct Registry {
    subscribers: HashMap<Uuid, mpsc::UnboundedSender<Delivery>>,
    /// channel name -> subscriber ids, in subscribe order.
    channels: HashMap<String, Vec<Uuid>>,
}

impl Registry {
    fn drop_subscriber(&mut self, id: Uuid) {
        self.subscribers.remove(&id);
        self.channels.retain(|_, members| {
            members.retain(|m| *m != id);
            !members.is_empty()
        });
    }
}

/// Shared registry. Cheap to clone; every clone sees the same channels.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<Mutex<Registry>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber and return its id.
    pub fn register(&self, tx: mpsc::UnboundedSender<Delivery>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).subscribers.insert(id, tx);
        id
    }

    /// Forget a subscriber and leave every channel it was on.
    pub fn remove_subscriber(&self, id: Uuid) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).drop_subscriber(id);
    }

    /// Subscribe `id` to `channel`. Subscribing twice is a no-op.
    pub fn subscribe(&self, id: Uuid, channel: &str) {
        let mut reg = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !reg.subscribers.contains_key(&id) {
            return;
        }
        let members = reg.channels.entry(channel.to_string()).or_default();
        if !members.contains(&id) {
            members.push(id);
        }
    }

    pub fn unsubscribe(&self, id: Uuid, channel: &str) {
        let mut reg = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(members) = reg.channels.get_mut(channel) {
            members.retain(|m| *m != id);
            if members.is_empty() {
                reg.channels.remove(channel);
            }
        }
    }

    /// Remove `channel` for every subscriber.
    pub fn close_channel(&self, channel: &str) {
        let removed = self.inner.lock().unwrap_or_else(PoisonError::into_inner).channels.remove(channel);
        if let Some(members) = removed {
            debug!(%channel, subscribers = members.len(), "hub: channel closed");
        }
    }

    /// Deliver `payload` to every subscriber of `channel`. Returns how many
    /// subscribers received it.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        let mut reg = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(members) = reg.channels.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for id in members {
            let Some(tx) = reg.subscribers.get(id) else {
                dead.push(*id);
                continue;
            };
            let delivery = Delivery { channel: channel.to_string(), payload: payload.to_string() };
            if tx.send(delivery).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            reg.drop_subscriber(id);
        }
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .channels
            .get(channel)
            .map_or(0, Vec::len)
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).channels.len()
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
