use super::*;
use crate::geometry::{BorderRange, ScreenGeometry};
use crate::link::LinkChannels;
use crate::transport::memory::MemoryBus;

const WINDOW_MS: i64 = 1000;
const CELL: f64 = 0.5;

struct Fixture {
    bus: MemoryBus,
    table: Arc<NeighborTable>,
    coordinator: PairingCoordinator,
    events: tokio::sync::broadcast::Receiver<DeviceEvent>,
}

fn screen() -> ScreenGeometry {
    ScreenGeometry::from_pixels(200.0, 200.0, 100.0)
}

fn fixture() -> Fixture {
    let config = DeviceConfig::default()
        .with_device_id("tile-a")
        .with_pairing_window_ms(WINDOW_MS)
        .with_cell_size_inches(CELL)
        .into_shared();
    let bus = MemoryBus::new();
    let (endpoint, _rx) = bus.endpoint();
    let table = Arc::new(NeighborTable::new());
    let events = event::channel();
    let rx = events.subscribe();
    let dims = GridDims::for_screen(&screen(), CELL);
    let coordinator = PairingCoordinator::new(config, dims, Arc::clone(&table), Arc::new(endpoint), events);
    Fixture { bus, table, coordinator, events: rx }
}

fn swipe(id: &str, direction: Direction, timestamp_ms: i64) -> GestureSample {
    let x = if direction == Direction::Right { 195.0 } else { 5.0 };
    GestureSample { direction, x, y: 100.0, timestamp_ms, screen: screen(), originator: DeviceId::new(id) }
}

// =============================================================================
// predicate
// =============================================================================

#[test]
fn window_boundary_is_inclusive() {
    let own = swipe("tile-a", Direction::Right, 10_000);
    assert!(check_coincidence(&own, &swipe("b", Direction::Left, 10_000 + WINDOW_MS), WINDOW_MS).is_ok());
    assert!(check_coincidence(&own, &swipe("b", Direction::Left, 10_000 - WINDOW_MS), WINDOW_MS).is_ok());

    let err = check_coincidence(&own, &swipe("b", Direction::Left, 10_000 + WINDOW_MS + 1), WINDOW_MS).unwrap_err();
    assert!(matches!(err, PairingError::OutsideWindow { delta_ms: 1001 }));
}

#[test]
fn directions_must_be_opposite() {
    let own = swipe("tile-a", Direction::Right, 0);
    let err = check_coincidence(&own, &swipe("b", Direction::Up, 0), WINDOW_MS).unwrap_err();
    assert!(matches!(err, PairingError::DirectionMismatch { local: Direction::Right, remote: Direction::Up }));
    assert!(check_coincidence(&own, &swipe("b", Direction::Right, 0), WINDOW_MS).is_err());
}

#[test]
fn extreme_timestamps_do_not_overflow() {
    let own = swipe("tile-a", Direction::Right, i64::MIN);
    let err = check_coincidence(&own, &swipe("b", Direction::Left, i64::MAX), WINDOW_MS).unwrap_err();
    assert!(matches!(err, PairingError::OutsideWindow { .. }));
}

// =============================================================================
// on_gesture_received
// =============================================================================

#[test]
fn matched_pinch_creates_link() {
    let mut fx = fixture();
    fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Right, 5_000));

    let link = fx.coordinator.on_gesture_received(&swipe("tile-b", Direction::Left, 5_400)).unwrap();
    assert_eq!(link.peer(), &DeviceId::new("tile-b"));
    assert_eq!(link.direction(), Direction::Right);
    assert_eq!(link.range(), BorderRange { first: 1, last: 4 });
    assert_eq!(fx.table.len(), 1);

    let expected = LinkChannels::derive(&DeviceId::new("tile-a"), &DeviceId::new("tile-b"));
    assert_eq!(link.channels(), &expected);
    assert_eq!(fx.bus.hub().subscriber_count(&expected.receive), 1);

    assert_eq!(fx.events.try_recv().unwrap(), DeviceEvent::Paired {
        peer: DeviceId::new("tile-b"),
        direction: Direction::Right,
        range: BorderRange { first: 1, last: 4 },
    });
}

#[test]
fn duplicate_pinch_keeps_one_link() {
    let fx = fixture();
    fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Right, 5_000));
    let pinch = swipe("tile-b", Direction::Left, 5_000);

    assert!(fx.coordinator.on_gesture_received(&pinch).is_ok());
    let err = fx.coordinator.on_gesture_received(&pinch).unwrap_err();
    assert!(matches!(err, PairingError::AlreadyPaired(peer) if peer == DeviceId::new("tile-b")));
    assert_eq!(fx.table.len(), 1);
}

#[test]
fn own_echo_is_ignored() {
    let fx = fixture();
    let own = swipe("tile-a", Direction::Right, 5_000);
    fx.coordinator.record_own_swipe(own.clone());
    assert!(matches!(fx.coordinator.on_gesture_received(&own), Err(PairingError::OwnEcho)));
    assert!(fx.table.is_empty());
}

#[test]
fn late_pinch_outside_window_is_rejected() {
    let fx = fixture();
    fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Right, 5_000));
    let err = fx.coordinator.on_gesture_received(&swipe("tile-b", Direction::Left, 6_001)).unwrap_err();
    assert!(matches!(err, PairingError::OutsideWindow { delta_ms: 1001 }));
    assert!(fx.table.is_empty());
}

#[test]
fn geometry_failure_inserts_nothing() {
    let fx = fixture();
    fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Right, 5_000));
    let mut remote = swipe("tile-b", Direction::Left, 5_000);
    remote.screen.dpi_y = 0.0;

    let err = fx.coordinator.on_gesture_received(&remote).unwrap_err();
    assert!(matches!(err, PairingError::Geometry(OverlapError::InvalidGeometry { field: "dpiY", .. })));
    assert!(fx.table.is_empty());
}

// =============================================================================
// arrival order
// =============================================================================

#[test]
fn pinch_before_own_swipe_pairs_on_record() {
    let fx = fixture();
    let err = fx.coordinator.on_gesture_received(&swipe("tile-b", Direction::Left, 5_000)).unwrap_err();
    assert!(matches!(err, PairingError::NoOwnSwipe));
    assert!(fx.table.is_empty());

    let links = fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Right, 5_300));
    assert_eq!(links.len(), 1);
    assert!(fx.table.contains(&DeviceId::new("tile-b")));
}

#[test]
fn stale_buffered_pinch_does_not_pair() {
    let fx = fixture();
    fx.coordinator.on_gesture_received(&swipe("tile-b", Direction::Left, 5_000)).unwrap_err();

    let links = fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Right, 9_000));
    assert!(links.is_empty());
    assert!(fx.table.is_empty());
}

#[test]
fn new_swipe_replaces_old() {
    let fx = fixture();
    fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Right, 1_000));
    fx.coordinator.record_own_swipe(swipe("tile-a", Direction::Up, 2_000));
    assert_eq!(fx.coordinator.last_own_swipe().map(|s| s.direction), Some(Direction::Up));
}
