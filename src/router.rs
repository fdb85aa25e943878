//! Inbound message dispatch.
//!
//! DESIGN
//! ======
//! Every delivery from every channel lands here. `dispatch` decodes once and
//! hands the typed message to `route`, which applies it to the pairing
//! coordinator, the engine or a link and returns an [`Outcome`]. `route`
//! never publishes; `dispatch` owns the one outbound effect, re-broadcasting
//! a run-state command so it spreads along chains of more than two tiles.
//!
//! COMMANDS
//! ========
//! `start`, `pause` and `reset` are honoured only from current neighbors.
//! A command that leaves the run state unchanged is not forwarded, which is
//! what stops an echo between two tiles. Resets carry a nonce and each nonce
//! is applied once; a reset without a nonce is applied but not forwarded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, trace, warn};

use crate::config::{DeviceConfig, DeviceId};
use crate::engine::GenerationEngine;
use crate::event::{self, DeviceEvent, EventSender};
use crate::geometry::GestureSample;
use crate::link::{NeighborLink, NeighborTable};
use crate::message::{Message, MessageError};
use crate::pairing::{PairingCoordinator, PairingError};
use crate::transport::{Delivery, Transport};

/// Reset nonces remembered for de-duplication.
const RESET_MEMORY: usize = 64;

/// What handling one message did. The dispatch layer acts on `Forward`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing changed.
    Ignored,
    /// Link flags or the grid were updated.
    Applied,
    Paired(DeviceId),
    Closed(DeviceId),
    /// State changed; broadcast this on to the network.
    Forward(Message),
}

pub struct ProtocolRouter {
    config: Arc<DeviceConfig>,
    table: Arc<NeighborTable>,
    pairing: Arc<PairingCoordinator>,
    engine: Arc<GenerationEngine>,
    transport: Arc<dyn Transport>,
    events: EventSender,
    seen_resets: Mutex<VecDeque<u64>>,
}

impl ProtocolRouter {
    pub fn new(
        config: Arc<DeviceConfig>,
        table: Arc<NeighborTable>,
        pairing: Arc<PairingCoordinator>,
        engine: Arc<GenerationEngine>,
        transport: Arc<dyn Transport>,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            table,
            pairing,
            engine,
            transport,
            events,
            seen_resets: Mutex::new(VecDeque::with_capacity(RESET_MEMORY)),
        }
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Decode, route and apply the outcome of one delivery. Never fails:
    /// bad input is logged and dropped.
    pub fn dispatch(&self, delivery: &Delivery) -> Outcome {
        let channel = delivery.channel.as_str();
        let message = match Message::decode(&delivery.payload) {
            Ok(message) => message,
            Err(MessageError::UnknownType(kind)) => {
                debug!(%channel, %kind, "router: unknown message type ignored");
                return Outcome::Ignored;
            }
            Err(e) => {
                warn!(%channel, error = %e, "router: malformed message discarded");
                return Outcome::Ignored;
            }
        };

        trace!(%channel, kind = message.kind(), sender = %message.sender(), "router: recv");
        let outcome = self.route(message);
        if let Outcome::Forward(message) = &outcome {
            if let Err(e) = self.transport.publish(&self.config.broadcast_channel, message) {
                warn!(kind = message.kind(), error = %e, "router: forward failed");
            }
        }
        outcome
    }

    /// Apply one decoded message to local state.
    pub fn route(&self, message: Message) -> Outcome {
        match message {
            Message::Pinch(sample) => self.handle_pinch(&sample),
            Message::Close { sender_id } => self.handle_close(&sender_id),
            Message::Start { sender_id } => self.handle_run_state(&sender_id, true),
            Message::Pause { sender_id } => self.handle_run_state(&sender_id, false),
            Message::Reset { sender_id, nonce } => self.handle_reset(&sender_id, nonce),
            Message::Cells { sender_id, cells_list } => match self.table.get(&sender_id) {
                Some(link) => {
                    link.deliver_cells(cells_list);
                    self.table.notify();
                    Outcome::Applied
                }
                None => {
                    debug!(peer = %sender_id, "router: cells from unlinked peer dropped");
                    Outcome::Ignored
                }
            },
            Message::Ready { sender_id } => match self.table.get(&sender_id) {
                Some(link) => {
                    link.deliver_ready();
                    self.table.notify();
                    Outcome::Applied
                }
                None => {
                    debug!(peer = %sender_id, "router: ready from unlinked peer dropped");
                    Outcome::Ignored
                }
            },
        }
    }

    // =========================================================================
    // HANDLERS
    // =========================================================================

    fn handle_pinch(&self, sample: &GestureSample) -> Outcome {
        match self.pairing.on_gesture_received(sample) {
            Ok(link) => Outcome::Paired(link.peer().clone()),
            Err(PairingError::OwnEcho) => Outcome::Ignored,
            Err(e) => {
                debug!(peer = %sample.originator, error = %e, "router: pinch not paired");
                Outcome::Ignored
            }
        }
    }

    fn handle_close(&self, peer: &DeviceId) -> Outcome {
        let Some(link) = self.table.remove(peer) else {
            return Outcome::Ignored;
        };
        self.teardown(&link);
        info!(%peer, remaining = self.table.len(), "router: link closed by peer");

        if self.table.is_empty() {
            self.engine.pause();
            self.engine.clear_ghosts();
        }
        Outcome::Closed(peer.clone())
    }

    /// Close both channels of a removed link and announce it.
    pub(crate) fn teardown(&self, link: &NeighborLink) {
        let channels = link.channels();
        for channel in [&channels.receive, &channels.send] {
            if let Err(e) = self.transport.close(channel) {
                warn!(peer = %link.peer(), %channel, error = %e, "router: channel close failed");
            }
        }
        event::emit(&self.events, DeviceEvent::Unpaired { peer: link.peer().clone() });
    }

    fn is_command_source(&self, sender: &DeviceId, kind: &str) -> bool {
        if *sender == self.config.device_id {
            return false;
        }
        if !self.table.contains(sender) {
            debug!(%sender, kind, "router: command from non-neighbor ignored");
            return false;
        }
        true
    }

    fn handle_run_state(&self, sender: &DeviceId, running: bool) -> Outcome {
        let kind = if running { "start" } else { "pause" };
        if !self.is_command_source(sender, kind) {
            return Outcome::Ignored;
        }
        let changed = if running { self.engine.start() } else { self.engine.pause() };
        if !changed {
            return Outcome::Ignored;
        }

        info!(%sender, kind, "router: run state from neighbor");
        let sender_id = self.config.device_id.clone();
        Outcome::Forward(if running { Message::Start { sender_id } } else { Message::Pause { sender_id } })
    }

    fn handle_reset(&self, sender: &DeviceId, nonce: u64) -> Outcome {
        if !self.is_command_source(sender, "reset") {
            return Outcome::Ignored;
        }
        if nonce != 0 && !self.remember_reset(nonce) {
            return Outcome::Ignored;
        }

        info!(%sender, nonce, "router: reset from neighbor");
        self.engine.reset();
        if nonce == 0 {
            return Outcome::Applied;
        }
        Outcome::Forward(Message::Reset { sender_id: self.config.device_id.clone(), nonce })
    }

    /// Record a reset nonce. Returns `false` if it was already seen.
    pub(crate) fn remember_reset(&self, nonce: u64) -> bool {
        let mut seen = self.seen_resets.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(&nonce) {
            return false;
        }
        if seen.len() == RESET_MEMORY {
            seen.pop_front();
        }
        seen.push_back(nonce);
        true
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
