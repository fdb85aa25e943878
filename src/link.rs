//! Per-peer link state and the table of active links.
//!
//! DESIGN
//! ======
//! A `NeighborLink` is created once per successful pairing and never
//! mutated structurally afterwards: its peer, overlap and channel names are
//! fixed for its lifetime. Only the round flags and the incoming cell buffer
//! change, and those are written by the router task and read-then-cleared by
//! the generation worker. Flags are atomics; the buffer has its own lock.
//!
//! `NeighborTable` serializes every insert and remove through one lock, so a
//! check-then-insert during pairing cannot race a concurrent close for the
//! same peer. Any change that could unblock a barrier wait (removal, cells
//! or ready arriving, run-state flips) is signalled through `notify`, which
//! stores a permit when the worker is not currently waiting.
//!
//! ROUND FLAGS
//! ===========
//! `cells_sent` → `cells_received` → (applied) → `ready_sent` →
//! `ready_received` → cleared. `cells_sent` outlives a pause so an
//! interrupted round resumes without sending the same generation twice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use crate::config::DeviceId;
use crate::geometry::{BorderRange, Direction, Overlap};

// =============================================================================
// CHANNEL NAMES
// =============================================================================

/// Point-to-point channel names for one link, seen from the local side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkChannels {
    /// Channel this device publishes `cells` and `ready` on.
    pub send: String,
    /// Channel the peer publishes on and this device subscribes to.
    pub receive: String,
}

impl LinkChannels {
    /// Derive both names from the two identities. The pair is written lower
    /// id first, followed by the publishing device, so both ends compute the
    /// same two names without exchanging anything.
    #[must_use]
    pub fn derive(local: &DeviceId, peer: &DeviceId) -> Self {
        let (low, high) = if local <= peer { (local, peer) } else { (peer, local) };
        Self { send: format!("link:{low}:{high}:{local}"), receive: format!("link:{low}:{high}:{peer}") }
    }
}

// =============================================================================
// NEIGHBOR LINK
// =============================================================================

/// Coarse progress of one link through the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Idle,
    CellsSent,
    CellsReceived,
    ReadySent,
    ReadyReceived,
}

#[derive(Debug)]
pub struct NeighborLink {
    peer: DeviceId,
    overlap: Overlap,
    channels: LinkChannels,
    cells_sent: AtomicBool,
    cells_received: AtomicBool,
    ready_sent: AtomicBool,
    ready_received: AtomicBool,
    incoming: Mutex<Vec<bool>>,
}

impl NeighborLink {
    #[must_use]
    pub fn new(local: &DeviceId, peer: DeviceId, overlap: Overlap) -> Self {
        let channels = LinkChannels::derive(local, &peer);
        Self {
            peer,
            overlap,
            channels,
            cells_sent: AtomicBool::new(false),
            cells_received: AtomicBool::new(false),
            ready_sent: AtomicBool::new(false),
            ready_received: AtomicBool::new(false),
            incoming: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn peer(&self) -> &DeviceId {
        &self.peer
    }

    /// Edge of this device that touches the peer.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.overlap.direction
    }

    #[must_use]
    pub fn range(&self) -> BorderRange {
        self.overlap.range
    }

    #[must_use]
    pub fn channels(&self) -> &LinkChannels {
        &self.channels
    }

    // -------------------------------------------------------------------------
    // cells
    // -------------------------------------------------------------------------

    /// Claim the send obligation for this round. Returns `false` if cells
    /// were already sent and not yet consumed.
    pub fn mark_cells_sent(&self) -> bool {
        !self.cells_sent.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn cells_sent(&self) -> bool {
        self.cells_sent.load(Ordering::Acquire)
    }

    /// Give back a claim whose publish failed so the next pass retries it.
    pub fn reset_cells_sent(&self) {
        self.cells_sent.store(false, Ordering::Release);
    }

    /// Store the peer's border cells for this round. A repeat delivery
    /// before the round consumes them replaces the earlier list.
    pub fn deliver_cells(&self, cells: Vec<bool>) {
        *self.incoming.lock().unwrap_or_else(PoisonError::into_inner) = cells;
        self.cells_received.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn cells_received(&self) -> bool {
        self.cells_received.load(Ordering::Acquire)
    }

    /// Take this round's cells and clear both cell flags, opening the link
    /// for the next round's exchange. `None` if nothing arrived.
    pub fn take_cells(&self) -> Option<Vec<bool>> {
        if !self.cells_received.swap(false, Ordering::AcqRel) {
            return None;
        }
        let cells = std::mem::take(&mut *self.incoming.lock().unwrap_or_else(PoisonError::into_inner));
        self.cells_sent.store(false, Ordering::Release);
        Some(cells)
    }

    /// Kill every buffered cell without touching the round flags. Used when
    /// the local grid is reset mid-round: the peer's cells describe a board
    /// that no longer exists, but the peer will not send them again.
    pub fn kill_incoming(&self) {
        self.incoming.lock().unwrap_or_else(PoisonError::into_inner).fill(false);
    }

    // -------------------------------------------------------------------------
    // ready
    // -------------------------------------------------------------------------

    pub fn mark_ready_sent(&self) {
        self.ready_sent.store(true, Ordering::Release);
    }

    pub fn deliver_ready(&self) {
        self.ready_received.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn ready_received(&self) -> bool {
        self.ready_received.load(Ordering::Acquire)
    }

    pub fn clear_ready(&self) {
        self.ready_sent.store(false, Ordering::Release);
        self.ready_received.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn phase(&self) -> LinkPhase {
        if self.ready_received.load(Ordering::Acquire) {
            LinkPhase::ReadyReceived
        } else if self.ready_sent.load(Ordering::Acquire) {
            LinkPhase::ReadySent
        } else if self.cells_received() {
            LinkPhase::CellsReceived
        } else if self.cells_sent() {
            LinkPhase::CellsSent
        } else {
            LinkPhase::Idle
        }
    }
}

// =============================================================================
// NEIGHBOR TABLE
// =============================================================================

#[derive(Debug, Default)]
pub struct NeighborTable {
    links: Mutex<HashMap<DeviceId, Arc<NeighborLink>>>,
    changed: Notify,
}

impl NeighborTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the link built by `build` unless `peer` already has one. The
    /// presence check, the build and the insert all run under the table
    /// lock, so `build` must be short and must not touch the table.
    ///
    /// Returns `Ok(None)` when a link for `peer` already exists.
    ///
    /// # Errors
    ///
    /// Propagates the error from `build`; nothing is inserted.
    pub fn insert_with<E>(
        &self,
        peer: &DeviceId,
        build: impl FnOnce() -> Result<NeighborLink, E>,
    ) -> Result<Option<Arc<NeighborLink>>, E> {
        let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        if links.contains_key(peer) {
            return Ok(None);
        }
        let link = Arc::new(build()?);
        links.insert(peer.clone(), Arc::clone(&link));
        drop(links);
        self.notify();
        Ok(Some(link))
    }

    #[must_use]
    pub fn get(&self, peer: &DeviceId) -> Option<Arc<NeighborLink>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner).get(peer).cloned()
    }

    #[must_use]
    pub fn contains(&self, peer: &DeviceId) -> bool {
        self.links.lock().unwrap_or_else(PoisonError::into_inner).contains_key(peer)
    }

    /// Remove the link for `peer` and wake any barrier wait.
    pub fn remove(&self, peer: &DeviceId) -> Option<Arc<NeighborLink>> {
        let removed = self.links.lock().unwrap_or_else(PoisonError::into_inner).remove(peer);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Remove every link and wake any barrier wait.
    pub fn drain(&self) -> Vec<Arc<NeighborLink>> {
        let drained: Vec<_> = self.links.lock().unwrap_or_else(PoisonError::into_inner).drain().map(|(_, l)| l).collect();
        self.notify();
        drained
    }

    /// Current links, cloned out so callers never hold the table lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<NeighborLink>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake the barrier wait, or leave a permit for its next wait.
    pub fn notify(&self) {
        self.changed.notify_one();
    }

    /// Resolves on the next `notify`, or immediately if a permit is stored.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}

#[cfg(test)]
#[path = "link_test.rs"]
mod tests;
