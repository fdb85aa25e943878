//! Generation loop and the barrier rounds that keep linked tiles in step.
//!
//! DESIGN
//! ======
//! One worker task per device owns stepping. While no link exists it steps
//! freely, waiting `solo_step_delay` between generations. With links it runs
//! barrier rounds:
//!
//! 1. Send this tile's border cells to every link that is still owed them.
//! 2. Wait until every link has both sent and received cells.
//! 3. Zero the ghost ring, then inject each link's received cells.
//! 4. Step the grid (double-buffered, see `grid`).
//! 5. Send `ready` to every link that took part in the round.
//! 6. Wait until every participant still linked has sent `ready` back.
//! 7. Clear ready flags and start over after `step_delay`.
//!
//! The second handshake keeps a fast tile from sending round N+1 cells
//! while a slow peer is still consuming round N.
//!
//! BARRIER EXITS
//! =============
//! Every wait ends in exactly one of three ways, checked in this order:
//! the table is empty (`Orphaned`), the condition holds (`Satisfied`), or the
//! device is no longer running (`Stopped`). Waits sleep on the table's
//! notify with `poll_interval` as an upper bound, and every table removal
//! notifies, so a vanished neighbor releases the worker at once.
//!
//! `Orphaned` during the cell wait discards partial data, zeroes the ghost
//! ring and steps alone. `Stopped` leaves the round where it was: cells
//! already sent are not sent again and a pending ready wait resumes on the
//! next start.
//!
//! LIFECYCLE
//! =========
//! `start` spawns the worker if none is alive, and wakes it if one is. The
//! worker re-checks the run flag under the worker lock before it gives up
//! its slot, so a start that races with an exiting worker either keeps that
//! worker going or spawns a new one, never neither.
//!
//! RESET
//! =====
//! A reset while running pauses and leaves a pending flag. The worker
//! applies it at its next check: the top of a step, every barrier poll, or
//! its exit. A start that lands first cannot skip it, and the flag is
//! cleared when applied so it never fires later.
//!
//! Applying a reset clears the interior and kills the peer cells buffered
//! for the round in flight. Cells this tile already sent from the old board
//! are killed the same way by the peer's own reset. Edits made while paused
//! in the middle of a round reach peers with the next round's border; this
//! round's border has already gone out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::event::{self, DeviceEvent, EventSender};
use crate::grid::{Grid, GridDims};
use crate::link::{NeighborLink, NeighborTable};
use crate::message::Message;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Paused,
    Running,
}

/// Why a barrier wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierExit {
    Satisfied,
    Orphaned,
    Stopped,
}

/// Where the worker is inside a linked round.
enum Round {
    Exchange,
    /// Ready sent to these links; waiting for theirs.
    AwaitReady(Vec<Arc<NeighborLink>>),
}

pub struct GenerationEngine {
    config: Arc<DeviceConfig>,
    grid: Mutex<Grid>,
    table: Arc<NeighborTable>,
    transport: Arc<dyn Transport>,
    events: EventSender,
    running: AtomicBool,
    pending_reset: AtomicBool,
    generation: AtomicU64,
    wake: Notify,
    round: Mutex<Round>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GenerationEngine {
    pub fn new(
        config: Arc<DeviceConfig>,
        dims: GridDims,
        table: Arc<NeighborTable>,
        transport: Arc<dyn Transport>,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            grid: Mutex::new(Grid::new(dims)),
            table,
            transport,
            events,
            running: AtomicBool::new(false),
            pending_reset: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            wake: Notify::new(),
            round: Mutex::new(Round::Exchange),
            worker: Mutex::new(None),
        }
    }

    fn grid(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn round(&self) -> MutexGuard<'_, Round> {
        self.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // RUN STATE
    // =========================================================================

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn run_state(&self) -> RunState {
        if self.is_running() { RunState::Running } else { RunState::Paused }
    }

    /// Switch to running. Returns `false` if already running.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(generation = self.generation(), "engine: running");
        event::emit(&self.events, DeviceEvent::RunStateChanged { running: true });

        let mut slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            let engine = Arc::clone(self);
            *slot = Some(tokio::spawn(async move { engine.run().await }));
        } else {
            self.wake.notify_one();
        }
        true
    }

    /// Switch to paused. Returns `false` if already paused. Takes effect at
    /// the worker's next round boundary or barrier check.
    pub fn pause(&self) -> bool {
        if !self.running.swap(false, Ordering::AcqRel) {
            return false;
        }
        info!(generation = self.generation(), live = self.grid().live_count(), "engine: paused");
        event::emit(&self.events, DeviceEvent::RunStateChanged { running: false });
        self.wake.notify_one();
        true
    }

    /// Clear the interior and pause. While a worker is alive the clear is
    /// left to it, at its next check.
    pub fn reset(&self) {
        self.pending_reset.store(true, Ordering::Release);
        self.pause();
        let slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            self.apply_pending_reset();
        }
    }

    fn apply_pending_reset(&self) {
        if !self.pending_reset.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let mut grid = self.grid();
            grid.clear_interior();
            grid.clear_all_ghosts();
        }
        let links = self.table.snapshot();
        for link in &links {
            link.kill_incoming();
        }
        info!(links = links.len(), "engine: grid cleared");
        event::emit(&self.events, DeviceEvent::GridCleared);
    }

    // =========================================================================
    // GRID ACCESS
    // =========================================================================

    /// Flip an interior cell. Editing is only allowed while paused.
    pub fn toggle_cell(&self, row: usize, column: usize) -> Option<bool> {
        if self.is_running() {
            return None;
        }
        self.grid().toggle(row, column)
    }

    /// Set interior cells alive, for seeding patterns while paused.
    pub fn seed(&self, live: &[(usize, usize)]) -> bool {
        if self.is_running() {
            return false;
        }
        self.grid().seed(live);
        true
    }

    /// Interior cells for rendering. May interleave with a step; callers
    /// only draw it.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Vec<bool>> {
        self.grid().interior()
    }

    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.grid().dims()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn clear_ghosts(&self) {
        self.grid().clear_all_ghosts();
    }

    // =========================================================================
    // WORKER
    // =========================================================================

    async fn run(self: Arc<Self>) {
        loop {
            self.run_until_stopped().await;
            if self.retire() {
                break;
            }
        }
        debug!("engine: worker exited");
    }

    /// Give up the worker slot unless a start slipped in. Returns whether
    /// the worker should exit.
    fn retire(&self) -> bool {
        let mut slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_running() {
            return false;
        }
        self.apply_pending_reset();
        *slot = None;
        true
    }

    async fn run_until_stopped(&self) {
        while self.is_running() {
            self.apply_pending_reset();
            if self.table.is_empty() {
                *self.round() = Round::Exchange;
                self.advance();
                self.rest(self.config.solo_step_delay).await;
                continue;
            }
            match self.linked_round().await {
                BarrierExit::Stopped => break,
                BarrierExit::Satisfied | BarrierExit::Orphaned => self.rest(self.config.step_delay).await,
            }
        }
    }

    /// Sleep between generations. A pause or start cuts it short.
    async fn rest(&self, delay: std::time::Duration) {
        tokio::select! {
            () = self.wake.notified() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }

    /// One barrier round, resuming wherever a stop interrupted the last one.
    async fn linked_round(&self) -> BarrierExit {
        let members = match &*self.round() {
            Round::AwaitReady(members) => Some(members.clone()),
            Round::Exchange => None,
        };

        let members = match members {
            Some(members) => members,
            None => {
                let (exit, members) = self
                    .wait_for(true, |links| links.iter().all(|l| l.cells_sent() && l.cells_received()))
                    .await;
                match exit {
                    BarrierExit::Stopped => return exit,
                    BarrierExit::Orphaned => {
                        debug!("engine: neighbors gone mid-round, stepping alone");
                        self.clear_ghosts();
                        self.advance();
                        return exit;
                    }
                    BarrierExit::Satisfied => {}
                }
                self.apply_ghosts(&members);
                self.advance();
                self.send_ready(&members);
                *self.round() = Round::AwaitReady(members.clone());
                members
            }
        };

        let (exit, _) = self
            .wait_for(false, |links| {
                members.iter().filter(|m| links.iter().any(|l| Arc::ptr_eq(l, m))).all(|m| m.ready_received())
            })
            .await;
        if exit == BarrierExit::Stopped {
            return exit;
        }
        for link in &members {
            link.clear_ready();
        }
        *self.round() = Round::Exchange;
        exit
    }

    /// Block until `satisfied` holds for the current links, the table
    /// empties, or the engine stops. Returns the links the condition held
    /// for.
    async fn wait_for<F>(&self, catch_up: bool, mut satisfied: F) -> (BarrierExit, Vec<Arc<NeighborLink>>)
    where
        F: FnMut(&[Arc<NeighborLink>]) -> bool,
    {
        loop {
            self.apply_pending_reset();
            if catch_up {
                self.send_pending_cells();
            }
            let links = self.table.snapshot();
            if links.is_empty() {
                return (BarrierExit::Orphaned, links);
            }
            if satisfied(&links) {
                return (BarrierExit::Satisfied, links);
            }
            if !self.is_running() {
                let phases: Vec<_> = links.iter().map(|l| (l.peer().to_string(), l.phase())).collect();
                debug!(?phases, "engine: barrier stopped");
                return (BarrierExit::Stopped, links);
            }
            tokio::select! {
                () = self.table.changed() => {}
                () = self.wake.notified() => {}
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Send border cells to every link that has not had them this round.
    fn send_pending_cells(&self) {
        for link in self.table.snapshot() {
            if !link.mark_cells_sent() {
                continue;
            }
            let cells = self.grid().border(link.direction(), link.range());
            let message = Message::Cells { sender_id: self.config.device_id.clone(), cells_list: cells };
            if let Err(e) = self.transport.publish(&link.channels().send, &message) {
                warn!(peer = %link.peer(), error = %e, "engine: cells send failed");
                link.reset_cells_sent();
            }
        }
    }

    /// Rebuild the ghost ring from this round's received cells. Ghosts of
    /// links that vanished since the last round are zeroed with the rest.
    fn apply_ghosts(&self, links: &[Arc<NeighborLink>]) {
        let mut grid = self.grid();
        grid.clear_all_ghosts();
        for link in links {
            let Some(cells) = link.take_cells() else {
                continue;
            };
            if cells.len() != link.range().len() {
                debug!(
                    peer = %link.peer(),
                    received = cells.len(),
                    expected = link.range().len(),
                    "engine: border length differs, zipping to shorter"
                );
            }
            grid.inject_ghost(link.direction(), link.range(), &cells);
        }
    }

    fn send_ready(&self, links: &[Arc<NeighborLink>]) {
        let message = Message::Ready { sender_id: self.config.device_id.clone() };
        for link in links {
            link.mark_ready_sent();
            if let Err(e) = self.transport.publish(&link.channels().send, &message) {
                warn!(peer = %link.peer(), error = %e, "engine: ready send failed");
            }
        }
    }

    fn advance(&self) -> u64 {
        self.grid().step();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        event::emit(&self.events, DeviceEvent::GenerationAdvanced { generation });
        generation
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
