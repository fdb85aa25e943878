//! Notifications for whatever renders a tile.
//!
//! Sent on a `tokio::sync::broadcast` channel. A slow or absent listener only
//! loses events; nothing in the protocol waits on them.

use tokio::sync::broadcast;

use crate::config::DeviceId;
use crate::geometry::{BorderRange, Direction};

/// Capacity of the event channel. Lagging listeners skip ahead.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Paired { peer: DeviceId, direction: Direction, range: BorderRange },
    Unpaired { peer: DeviceId },
    RunStateChanged { running: bool },
    GenerationAdvanced { generation: u64 },
    GridCleared,
}

pub type EventSender = broadcast::Sender<DeviceEvent>;

#[must_use]
pub fn channel() -> EventSender {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Send an event, ignoring the case where nobody is listening.
pub fn emit(events: &EventSender, event: DeviceEvent) {
    if events.send(event).is_err() {
        tracing::trace!("event dropped: no listeners");
    }
}
