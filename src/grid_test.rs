use super::*;

const FIVE: GridDims = GridDims { rows: 5, columns: 5 };

fn range(first: usize, last: usize) -> BorderRange {
    BorderRange { first, last }
}

fn grid_with(dims: GridDims, live: &[(usize, usize)]) -> Grid {
    let mut grid = Grid::new(dims);
    grid.seed(live);
    grid
}

/// All cells of the full buffer, ghost ring included.
fn every_cell(grid: &Grid) -> Vec<bool> {
    let GridDims { rows, columns } = grid.dims();
    (0..rows + 2)
        .flat_map(|r| (0..columns + 2).map(move |c| (r, c)))
        .map(|(r, c)| grid.get(r, c))
        .collect()
}

// =============================================================================
// step
// =============================================================================

#[test]
fn blinker_rotates_and_returns() {
    let horizontal = [(3, 2), (3, 3), (3, 4)];
    let vertical = [(2, 3), (3, 3), (4, 3)];
    let mut grid = grid_with(FIVE, &horizontal);

    grid.step();
    assert_eq!(grid.interior(), grid_with(FIVE, &vertical).interior());
    assert_eq!(grid.live_count(), 3);
    for (r, c) in vertical {
        assert!(grid.get(r, c), "({r},{c}) should be alive after one step");
    }

    grid.step();
    for (r, c) in horizontal {
        assert!(grid.get(r, c), "({r},{c}) should be alive after two steps");
    }
    assert_eq!(grid.live_count(), 3);
}

#[test]
fn block_is_stable() {
    let block = [(2, 2), (2, 3), (3, 2), (3, 3)];
    let mut grid = grid_with(FIVE, &block);
    grid.step();
    grid.step();
    assert_eq!(grid.interior(), grid_with(FIVE, &block).interior());
}

#[test]
fn lone_cell_dies() {
    let mut grid = grid_with(FIVE, &[(3, 3)]);
    grid.step();
    assert_eq!(grid.live_count(), 0);
}

#[test]
fn ghost_cells_count_as_neighbors() {
    let mut grid = Grid::new(FIVE);
    // Three live ghosts beside row 2..=4 of the right edge give birth at (3,5).
    grid.inject_ghost(Direction::Right, range(2, 4), &[true, true, true]);
    grid.step();
    assert!(grid.get(3, 5));
    assert_eq!(grid.live_count(), 1);
}

#[test]
fn step_clears_ghost_ring() {
    let mut grid = Grid::new(FIVE);
    grid.inject_ghost(Direction::Up, range(1, 5), &[true; 5]);
    grid.step();
    assert!((1..=5).all(|c| !grid.get(0, c)));
}

// =============================================================================
// ghosts
// =============================================================================

#[test]
fn inject_right_touches_only_ghost_column() {
    let mut grid = Grid::new(FIVE);
    let before = every_cell(&grid);
    let values = [true, false, true];

    grid.inject_ghost(Direction::Right, range(2, 4), &values);

    for (offset, row) in (2..=4).enumerate() {
        assert_eq!(grid.get(row, FIVE.columns + 1), values[offset]);
    }
    let after = every_cell(&grid);
    let changed = before.iter().zip(&after).filter(|(a, b)| a != b).count();
    assert_eq!(changed, 2);
    assert_eq!(grid.live_count(), 0);
}

#[test]
fn inject_places_each_edge() {
    let mut grid = Grid::new(FIVE);
    grid.inject_ghost(Direction::Up, range(1, 1), &[true]);
    grid.inject_ghost(Direction::Down, range(2, 2), &[true]);
    grid.inject_ghost(Direction::Left, range(3, 3), &[true]);
    grid.inject_ghost(Direction::Right, range(4, 4), &[true]);

    assert!(grid.get(0, 1));
    assert!(grid.get(6, 2));
    assert!(grid.get(3, 0));
    assert!(grid.get(4, 6));
}

#[test]
fn short_list_pads_dead() {
    let mut grid = Grid::new(FIVE);
    grid.inject_ghost(Direction::Left, range(1, 5), &[true; 5]);
    grid.inject_ghost(Direction::Left, range(1, 5), &[true, true]);

    let column: Vec<bool> = (1..=5).map(|r| grid.get(r, 0)).collect();
    assert_eq!(column, vec![true, true, false, false, false]);
}

#[test]
fn long_list_is_truncated() {
    let mut grid = Grid::new(FIVE);
    grid.inject_ghost(Direction::Down, range(4, 5), &[true, true, true, true]);

    assert!(grid.get(6, 4));
    assert!(grid.get(6, 5));
    // Corner stays untouched.
    assert!(!grid.get(6, 6));
}

#[test]
fn seed_skips_ghost_ring() {
    let grid = grid_with(FIVE, &[(0, 2), (2, 6), (6, 6), (3, 3)]);
    assert_eq!(grid.live_count(), 1);
    assert_eq!(every_cell(&grid).iter().filter(|&&c| c).count(), 1);
}

#[test]
fn clear_all_ghosts_keeps_interior() {
    let mut grid = grid_with(FIVE, &[(1, 1), (5, 5)]);
    grid.inject_ghost(Direction::Up, range(1, 5), &[true; 5]);
    grid.inject_ghost(Direction::Left, range(1, 5), &[true; 5]);
    grid.clear_all_ghosts();

    assert_eq!(grid.live_count(), 2);
    assert_eq!(every_cell(&grid).iter().filter(|&&c| c).count(), 2);
}

// =============================================================================
// borders and editing
// =============================================================================

#[test]
fn border_reads_outermost_interior_line() {
    let grid = grid_with(FIVE, &[(2, 5), (4, 5), (1, 1), (5, 3)]);
    assert_eq!(grid.border(Direction::Right, range(1, 5)), vec![false, true, false, true, false]);
    assert_eq!(grid.border(Direction::Left, range(1, 2)), vec![true, false]);
    assert_eq!(grid.border(Direction::Up, range(1, 3)), vec![true, false, false]);
    assert_eq!(grid.border(Direction::Down, range(3, 3)), vec![true]);
}

#[test]
fn toggle_rejects_ghost_ring() {
    let mut grid = Grid::new(FIVE);
    assert_eq!(grid.toggle(0, 3), None);
    assert_eq!(grid.toggle(3, 6), None);
    assert_eq!(grid.toggle(3, 3), Some(true));
    assert_eq!(grid.toggle(3, 3), Some(false));
}

#[test]
fn clear_interior_keeps_ghosts() {
    let mut grid = grid_with(FIVE, &[(2, 2)]);
    grid.inject_ghost(Direction::Up, range(2, 2), &[true]);
    grid.clear_interior();
    assert_eq!(grid.live_count(), 0);
    assert!(grid.get(0, 2));
}

#[test]
fn out_of_bounds_reads_are_dead() {
    let mut grid = Grid::new(FIVE);
    assert!(!grid.get(100, 100));
    assert!(!grid.set(7, 0, true));
}

#[test]
fn dims_for_screen_floor_whole_cells() {
    let screen = ScreenGeometry::from_pixels(310.0, 520.0, 100.0);
    assert_eq!(GridDims::for_screen(&screen, 0.5), GridDims { rows: 10, columns: 6 });
    assert_eq!(GridDims::for_screen(&screen, 0.0), GridDims { rows: 0, columns: 0 });
}
