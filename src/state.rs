//! Shared device state: one tile, fully wired.
//!
//! DESIGN
//! ======
//! `DeviceState` is the context object built once at startup. It owns the
//! neighbor table and hands shared handles of it, the config and the
//! transport to the pairing coordinator, the engine and the router, so no
//! component reads global state. Clone is cheap; every field is an `Arc` or
//! a channel handle.
//!
//! Local user actions (swipes, cell edits, start/pause/reset, lifting the
//! screen) enter here. Remote traffic enters through `spawn_inbound`, which
//! feeds the router from the transport's delivery queue.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{DeviceConfig, DeviceId};
use crate::engine::{GenerationEngine, RunState};
use crate::event::{self, DeviceEvent, EventSender};
use crate::geometry::{Direction, GestureSample, ScreenGeometry};
use crate::grid::GridDims;
use crate::link::NeighborTable;
use crate::message::{Message, MessageError};
use crate::pairing::PairingCoordinator;
use crate::router::ProtocolRouter;
use crate::transport::ws::WsTransport;
use crate::transport::{Delivery, Transport, TransportError};

#[derive(Clone)]
pub struct DeviceState {
    pub config: Arc<DeviceConfig>,
    pub screen: ScreenGeometry,
    pub table: Arc<NeighborTable>,
    pub pairing: Arc<PairingCoordinator>,
    pub engine: Arc<GenerationEngine>,
    pub router: Arc<ProtocolRouter>,
    transport: Arc<dyn Transport>,
    events: EventSender,
}

impl DeviceState {
    /// Wire a tile and join the broadcast channel.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the broadcast subscribe fails.
    pub fn new(config: DeviceConfig, screen: ScreenGeometry, transport: Arc<dyn Transport>) -> Result<Self, TransportError> {
        let config = config.into_shared();
        let dims = GridDims::for_screen(&screen, config.cell_size_inches);
        let table = Arc::new(NeighborTable::new());
        let events = event::channel();

        let pairing = Arc::new(PairingCoordinator::new(
            Arc::clone(&config),
            dims,
            Arc::clone(&table),
            Arc::clone(&transport),
            events.clone(),
        ));
        let engine = Arc::new(GenerationEngine::new(
            Arc::clone(&config),
            dims,
            Arc::clone(&table),
            Arc::clone(&transport),
            events.clone(),
        ));
        let router = Arc::new(ProtocolRouter::new(
            Arc::clone(&config),
            Arc::clone(&table),
            Arc::clone(&pairing),
            Arc::clone(&engine),
            Arc::clone(&transport),
            events.clone(),
        ));

        transport.subscribe(&config.broadcast_channel)?;
        info!(device = %config.device_id, rows = dims.rows, columns = dims.columns, "device: ready");

        Ok(Self { config, screen, table, pairing, engine, router, transport, events })
    }

    /// Join the relay at `config.relay_url` and start routing its traffic.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the relay cannot be reached.
    pub async fn connect(config: DeviceConfig, screen: ScreenGeometry) -> Result<Self, TransportError> {
        let (transport, rx) = WsTransport::connect(&config.relay_url).await?;
        let state = Self::new(config, screen, Arc::new(transport))?;
        state.spawn_inbound(rx);
        Ok(state)
    }

    /// Feed deliveries to the router until the transport's queue closes.
    /// A closed queue means the tile can no longer hear its neighbors, so
    /// every link is dropped locally.
    pub fn spawn_inbound(&self, mut rx: mpsc::UnboundedReceiver<Delivery>) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                state.router.dispatch(&delivery);
            }
            state.transport_lost();
        })
    }

    /// Local half of `disconnect_all`: nothing is sent, since the transport
    /// is gone.
    fn transport_lost(&self) {
        let links = self.table.drain();
        for link in &links {
            event::emit(&self.events, DeviceEvent::Unpaired { peer: link.peer().clone() });
        }
        warn!(links = links.len(), "device: inbound closed, neighbors dropped");
        self.engine.pause();
        self.engine.clear_ghosts();
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.config.device_id
    }

    // =========================================================================
    // USER ACTIONS
    // =========================================================================

    /// Record a swipe toward a screen edge and offer it for pairing.
    /// Returns peers linked immediately from pinches that arrived first.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the pinch cannot be broadcast. A
    /// swipe with a non-finite coordinate is rejected before it is recorded.
    pub fn swipe(&self, direction: Direction, x: f64, y: f64, timestamp_ms: i64) -> Result<Vec<DeviceId>, TransportError> {
        let sample =
            GestureSample { direction, x, y, timestamp_ms, screen: self.screen, originator: self.config.device_id.clone() };
        if let Some(field) = sample.non_finite_field() {
            return Err(MessageError::NonFinite(field).into());
        }
        let linked = self.pairing.record_own_swipe(sample.clone());
        self.transport.publish(&self.config.broadcast_channel, &Message::Pinch(sample))?;
        Ok(linked.iter().map(|link| link.peer().clone()).collect())
    }

    /// Flip a cell while paused.
    pub fn toggle_cell(&self, row: usize, column: usize) -> Option<bool> {
        self.engine.toggle_cell(row, column)
    }

    /// Bring cells to life while paused.
    pub fn seed(&self, live: &[(usize, usize)]) -> bool {
        self.engine.seed(live)
    }

    /// Start locally and tell the neighbors. Returns `false` if already
    /// running.
    pub fn user_start(&self) -> bool {
        if !self.engine.start() {
            return false;
        }
        self.broadcast_if_connected(&Message::Start { sender_id: self.config.device_id.clone() });
        true
    }

    /// Pause locally and tell the neighbors. Returns `false` if already
    /// paused.
    pub fn user_pause(&self) -> bool {
        if !self.engine.pause() {
            return false;
        }
        self.broadcast_if_connected(&Message::Pause { sender_id: self.config.device_id.clone() });
        true
    }

    /// Clear the grid here and on every reachable tile.
    pub fn user_reset(&self) {
        let nonce = rand::rng().random::<u64>() | 1;
        self.router.remember_reset(nonce);
        self.engine.reset();
        self.broadcast_if_connected(&Message::Reset { sender_id: self.config.device_id.clone(), nonce });
    }

    /// The screen left the table: drop every link, tell the peers, forget
    /// their ghost cells and pause.
    pub fn disconnect_all(&self) {
        let links = self.table.drain();
        if !links.is_empty() {
            let close = Message::Close { sender_id: self.config.device_id.clone() };
            if let Err(e) = self.transport.publish(&self.config.broadcast_channel, &close) {
                warn!(error = %e, "device: close broadcast failed");
            }
        }
        for link in &links {
            self.router.teardown(link);
        }
        info!(links = links.len(), "device: disconnected from all neighbors");
        self.engine.pause();
        self.engine.clear_ghosts();
    }

    fn broadcast_if_connected(&self, message: &Message) {
        if self.table.is_empty() {
            return;
        }
        if let Err(e) = self.transport.publish(&self.config.broadcast_channel, message) {
            warn!(kind = message.kind(), error = %e, "device: broadcast failed");
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> Vec<Vec<bool>> {
        self.engine.snapshot()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.engine.generation()
    }

    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.engine.run_state()
    }

    #[must_use]
    pub fn neighbor_count(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
