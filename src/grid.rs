//! Local Game-of-Life grid with a one-cell ghost ring.
//!
//! DESIGN
//! ======
//! Storage is `(rows + 2) × (columns + 2)` booleans, row-major. Interior cells
//! are `1..=rows` × `1..=columns`; the outer ring holds cells contributed by
//! neighbors and is never drawn. Ghost placement per edge:
//!
//! - UP    → row `0`,          columns in range
//! - DOWN  → row `rows + 1`,   columns in range
//! - LEFT  → column `0`,       rows in range
//! - RIGHT → column `columns + 1`, rows in range
//!
//! `step` reads the current buffer and writes the next generation into a
//! scratch buffer before swapping, so neighbor counts never observe a
//! half-updated grid. The ghost ring of the new buffer starts dead; ghosts
//! are re-injected every connected round.

use crate::geometry::{BorderRange, Direction, ScreenGeometry};

/// Interior size of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub rows: usize,
    pub columns: usize,
}

impl GridDims {
    /// Whole cells that fit on a screen: rows along the height, columns along
    /// the width.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_screen(screen: &ScreenGeometry, cell_size: f64) -> Self {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Self { rows: 0, columns: 0 };
        }
        let fit = |inches: f64| (inches / cell_size).floor().max(0.0) as usize;
        Self { rows: fit(screen.height_inches), columns: fit(screen.width_inches) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    dims: GridDims,
    cells: Vec<bool>,
    scratch: Vec<bool>,
}

impl Grid {
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        let len = (dims.rows + 2) * (dims.columns + 2);
        Self { dims, cells: vec![false; len], scratch: vec![false; len] }
    }

    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    fn index(&self, row: usize, column: usize) -> Option<usize> {
        (row < self.dims.rows + 2 && column < self.dims.columns + 2).then(|| row * (self.dims.columns + 2) + column)
    }

    fn is_interior(&self, row: usize, column: usize) -> bool {
        (1..=self.dims.rows).contains(&row) && (1..=self.dims.columns).contains(&column)
    }

    /// State of any cell, ghost ring included. Out of bounds reads are dead.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> bool {
        self.index(row, column).is_some_and(|i| self.cells[i])
    }

    /// Set any cell, ghost ring included. Returns `false` if out of bounds.
    pub fn set(&mut self, row: usize, column: usize, alive: bool) -> bool {
        let Some(i) = self.index(row, column) else {
            return false;
        };
        self.cells[i] = alive;
        true
    }

    /// Flip an interior cell. Returns the new state, or `None` if the
    /// position is not an interior cell.
    pub fn toggle(&mut self, row: usize, column: usize) -> Option<bool> {
        if !self.is_interior(row, column) {
            return None;
        }
        let i = self.index(row, column)?;
        self.cells[i] = !self.cells[i];
        Some(self.cells[i])
    }

    // =========================================================================
    // BORDERS
    // =========================================================================

    /// Position of the `index`th cell along an edge, either on the outermost
    /// interior line (`ghost == false`) or on the ghost ring beyond it.
    fn edge_cell(&self, direction: Direction, index: usize, ghost: bool) -> (usize, usize) {
        let GridDims { rows, columns } = self.dims;
        match (direction, ghost) {
            (Direction::Up, false) => (1, index),
            (Direction::Up, true) => (0, index),
            (Direction::Down, false) => (rows, index),
            (Direction::Down, true) => (rows + 1, index),
            (Direction::Left, false) => (index, 1),
            (Direction::Left, true) => (index, 0),
            (Direction::Right, false) => (index, columns),
            (Direction::Right, true) => (index, columns + 1),
        }
    }

    /// Outermost interior cells along an edge, in range order. This is what a
    /// device sends to the neighbor on that edge.
    #[must_use]
    pub fn border(&self, direction: Direction, range: BorderRange) -> Vec<bool> {
        range
            .indices()
            .map(|i| {
                let (row, column) = self.edge_cell(direction, i, false);
                self.get(row, column)
            })
            .collect()
    }

    /// Write neighbor cells into the ghost ring along an edge. Lists of a
    /// different length are zipped to the shorter one; range cells past the
    /// end of `cells` are set dead.
    pub fn inject_ghost(&mut self, direction: Direction, range: BorderRange, cells: &[bool]) {
        for (offset, i) in range.indices().enumerate() {
            let alive = cells.get(offset).copied().unwrap_or(false);
            let (row, column) = self.edge_cell(direction, i, true);
            self.set(row, column, alive);
        }
    }

    /// Zero the whole ghost ring.
    pub fn clear_all_ghosts(&mut self) {
        let GridDims { rows, columns } = self.dims;
        for column in 0..columns + 2 {
            self.set(0, column, false);
            self.set(rows + 1, column, false);
        }
        for row in 0..rows + 2 {
            self.set(row, 0, false);
            self.set(row, columns + 1, false);
        }
    }

    /// Bring interior cells to life. Coordinates outside the interior are
    /// skipped.
    pub fn seed(&mut self, live: &[(usize, usize)]) {
        for &(row, column) in live {
            if (1..=self.dims.rows).contains(&row) && (1..=self.dims.columns).contains(&column) {
                self.set(row, column, true);
            }
        }
    }

    /// Kill every interior cell. Ghosts are left alone.
    pub fn clear_interior(&mut self) {
        for row in 1..=self.dims.rows {
            for column in 1..=self.dims.columns {
                self.set(row, column, false);
            }
        }
    }

    // =========================================================================
    // GENERATION
    // =========================================================================

    fn live_neighbors(&self, row: usize, column: usize) -> usize {
        let mut count = 0;
        for r in row - 1..=row + 1 {
            for c in column - 1..=column + 1 {
                if (r, c) != (row, column) && self.get(r, c) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Advance one generation. Survive on 2 or 3, birth on exactly 3.
    pub fn step(&mut self) {
        self.scratch.fill(false);
        for row in 1..=self.dims.rows {
            for column in 1..=self.dims.columns {
                let neighbors = self.live_neighbors(row, column);
                let alive = matches!((self.get(row, column), neighbors), (true, 2 | 3) | (false, 3));
                if alive {
                    if let Some(i) = self.index(row, column) {
                        self.scratch[i] = true;
                    }
                }
            }
        }
        std::mem::swap(&mut self.cells, &mut self.scratch);
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        (1..=self.dims.rows)
            .flat_map(|row| (1..=self.dims.columns).map(move |column| (row, column)))
            .filter(|&(row, column)| self.get(row, column))
            .count()
    }

    /// Interior rows for rendering, top to bottom.
    #[must_use]
    pub fn interior(&self) -> Vec<Vec<bool>> {
        (1..=self.dims.rows)
            .map(|row| (1..=self.dims.columns).map(|column| self.get(row, column)).collect())
            .collect()
    }
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod tests;
