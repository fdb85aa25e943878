//! Pairing: turning two coincident swipes into a neighbor link.
//!
//! DESIGN
//! ======
//! A device keeps only its latest own swipe. A remote pinch pairs with it
//! when the two timestamps are within the configured window and the two
//! directions are exactly opposite (one tile swiped RIGHT, the other LEFT).
//!
//! The two swipes of a physical pinch finish on different devices at
//! slightly different moments, so either pinch can arrive before the local
//! swipe is recorded. Remote pinches are therefore also kept in a small
//! buffer and re-checked whenever a new own swipe is recorded. Whichever
//! order the two events arrive in, both tiles end up paired.
//!
//! On acceptance the overlap is computed from the local perspective, the
//! receive channel is subscribed, and the link is inserted. All three happen
//! inside one `NeighborTable::insert_with`, so a duplicate pinch or a close
//! racing with pairing sees either no link or a complete one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::config::{DeviceConfig, DeviceId};
use crate::event::{self, DeviceEvent, EventSender};
use crate::geometry::{Direction, GestureSample, OverlapError, compute_overlap};
use crate::grid::GridDims;
use crate::link::{NeighborLink, NeighborTable};
use crate::transport::{Transport, TransportError};

/// Remote pinches kept for matching against a later own swipe.
const RECENT_REMOTE_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("no own swipe recorded yet")]
    NoOwnSwipe,
    #[error("own pinch echoed back")]
    OwnEcho,
    #[error("already paired with {0}")]
    AlreadyPaired(DeviceId),
    #[error("swipes are {delta_ms}ms apart, outside the pairing window")]
    OutsideWindow { delta_ms: u64 },
    #[error("directions {local:?} and {remote:?} are not opposite")]
    DirectionMismatch { local: Direction, remote: Direction },
    #[error(transparent)]
    Geometry(#[from] OverlapError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Whether two swipes describe the same physical pinch: timestamps at most
/// `window_ms` apart (inclusive) and directions exactly opposite.
///
/// # Errors
///
/// [`PairingError::OutsideWindow`] or [`PairingError::DirectionMismatch`].
pub fn check_coincidence(local: &GestureSample, remote: &GestureSample, window_ms: i64) -> Result<(), PairingError> {
    let delta_ms = local.timestamp_ms.abs_diff(remote.timestamp_ms);
    if delta_ms > window_ms.unsigned_abs() {
        return Err(PairingError::OutsideWindow { delta_ms });
    }
    if remote.direction != local.direction.opposite() {
        return Err(PairingError::DirectionMismatch { local: local.direction, remote: remote.direction });
    }
    Ok(())
}

pub struct PairingCoordinator {
    config: Arc<DeviceConfig>,
    dims: GridDims,
    last_own: Mutex<Option<GestureSample>>,
    recent_remote: Mutex<VecDeque<GestureSample>>,
    table: Arc<NeighborTable>,
    transport: Arc<dyn Transport>,
    events: EventSender,
}

impl PairingCoordinator {
    pub fn new(
        config: Arc<DeviceConfig>,
        dims: GridDims,
        table: Arc<NeighborTable>,
        transport: Arc<dyn Transport>,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            dims,
            last_own: Mutex::new(None),
            recent_remote: Mutex::new(VecDeque::with_capacity(RECENT_REMOTE_CAPACITY)),
            table,
            transport,
            events,
        }
    }

    #[must_use]
    pub fn last_own_swipe(&self) -> Option<GestureSample> {
        self.last_own.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the stored own swipe, then try it against remote pinches
    /// that arrived before it. Returns the links this created.
    pub fn record_own_swipe(&self, sample: GestureSample) -> Vec<Arc<NeighborLink>> {
        *self.last_own.lock().unwrap_or_else(PoisonError::into_inner) = Some(sample.clone());

        let candidates: Vec<GestureSample> = {
            let mut recent = self.recent_remote.lock().unwrap_or_else(PoisonError::into_inner);
            let window = self.config.pairing_window_ms;
            recent.retain(|r| !self.table.contains(&r.originator));
            recent.iter().filter(|r| check_coincidence(&sample, r, window).is_ok()).cloned().collect()
        };

        candidates
            .iter()
            .filter_map(|remote| match self.pair(&sample, remote) {
                Ok(link) => Some(link),
                Err(e) => {
                    debug!(peer = %remote.originator, error = %e, "pairing: buffered pinch rejected");
                    None
                }
            })
            .collect()
    }

    /// Handle a `pinch` from the broadcast channel.
    ///
    /// # Errors
    ///
    /// Returns why the pinch did not produce a new link. Every error here is
    /// an expected outcome of broadcast traffic, not a fault.
    pub fn on_gesture_received(&self, remote: &GestureSample) -> Result<Arc<NeighborLink>, PairingError> {
        if remote.originator == self.config.device_id {
            return Err(PairingError::OwnEcho);
        }
        self.remember_remote(remote);

        let own = self.last_own_swipe().ok_or(PairingError::NoOwnSwipe)?;
        self.pair(&own, remote)
    }

    fn remember_remote(&self, remote: &GestureSample) {
        let mut recent = self.recent_remote.lock().unwrap_or_else(PoisonError::into_inner);
        recent.retain(|r| r.originator != remote.originator);
        if recent.len() == RECENT_REMOTE_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(remote.clone());
    }

    fn pair(&self, own: &GestureSample, remote: &GestureSample) -> Result<Arc<NeighborLink>, PairingError> {
        let peer = &remote.originator;
        if self.table.contains(peer) {
            return Err(PairingError::AlreadyPaired(peer.clone()));
        }
        check_coincidence(own, remote, self.config.pairing_window_ms)?;
        let overlap = compute_overlap(own, remote, self.dims, self.config.cell_size_inches)?;

        let inserted = self.table.insert_with(peer, || {
            let link = NeighborLink::new(&self.config.device_id, peer.clone(), overlap);
            self.transport.subscribe(&link.channels().receive)?;
            Ok::<_, PairingError>(link)
        })?;
        let Some(link) = inserted else {
            return Err(PairingError::AlreadyPaired(peer.clone()));
        };

        info!(
            %peer,
            direction = ?overlap.direction,
            first = overlap.range.first,
            last = overlap.range.last,
            "pairing: linked"
        );
        event::emit(&self.events, DeviceEvent::Paired {
            peer: peer.clone(),
            direction: overlap.direction,
            range: overlap.range,
        });
        Ok(link)
    }
}

#[cfg(test)]
#[path = "pairing_test.rs"]
mod tests;
