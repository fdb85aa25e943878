//! Gesture samples and the border overlap between two touching screens.
//!
//! DESIGN
//! ======
//! Each screen is treated as a physical rectangle measured in inches, with
//! its grid laid over it as square cells of `cell_size` inches anchored at
//! the top-left corner. A swipe reports a pixel position; dividing by the
//! screen density gives its physical offset along the touching edge.
//!
//! Both swipes mark the same contact point, so aligning the two offsets
//! places the remote edge in local coordinates. The intersection of the two
//! edges, expressed in local cell indices, is the border range exposed to
//! that neighbor. Each side runs this from its own perspective; nothing
//! about the range is sent on the wire.

use serde::{Deserialize, Serialize};

use crate::config::DeviceId;
use crate::grid::GridDims;

// =============================================================================
// DIRECTION
// =============================================================================

/// Swipe direction, which doubles as the edge of the local screen that
/// touches the peer (swiping RIGHT means the peer sits on the right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// UP and DOWN edges run along the horizontal axis.
    #[must_use]
    pub fn is_horizontal_edge(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

// =============================================================================
// SAMPLES
// =============================================================================

/// Physical size and pixel density of a screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    #[serde(rename = "screenWidth")]
    pub width_inches: f64,
    #[serde(rename = "screenHeight")]
    pub height_inches: f64,
    #[serde(rename = "dpiX")]
    pub dpi_x: f64,
    #[serde(rename = "dpiY")]
    pub dpi_y: f64,
}

impl ScreenGeometry {
    /// Geometry of a screen given in pixels at a uniform density.
    #[must_use]
    pub fn from_pixels(width_px: f64, height_px: f64, dpi: f64) -> Self {
        Self { width_inches: width_px / dpi, height_inches: height_px / dpi, dpi_x: dpi, dpi_y: dpi }
    }

    fn validate(&self) -> Result<(), OverlapError> {
        positive("screenWidth", self.width_inches)?;
        positive("screenHeight", self.height_inches)?;
        positive("dpiX", self.dpi_x)?;
        positive("dpiY", self.dpi_y)
    }
}

/// One observed swipe, as reported by the gesture recognizer. Immutable once
/// built; a device keeps only its latest own sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureSample {
    pub direction: Direction,
    /// Swipe end position in screen pixels.
    pub x: f64,
    pub y: f64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub screen: ScreenGeometry,
    #[serde(rename = "senderId")]
    pub originator: DeviceId,
}

impl GestureSample {
    /// First coordinate that JSON cannot carry, if any.
    #[must_use]
    pub fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("x", self.x),
            ("y", self.y),
            ("screenWidth", self.screen.width_inches),
            ("screenHeight", self.screen.height_inches),
            ("dpiX", self.screen.dpi_x),
            ("dpiY", self.screen.dpi_y),
        ]
        .into_iter()
        .find_map(|(field, value)| (!value.is_finite()).then_some(field))
    }

    /// Physical offset of the swipe along the edge it points at.
    fn edge_offset_inches(&self) -> f64 {
        if self.direction.is_horizontal_edge() {
            self.x / self.screen.dpi_x
        } else {
            self.y / self.screen.dpi_y
        }
    }

    /// Physical length of the edge the swipe points at.
    fn edge_length_inches(&self) -> f64 {
        if self.direction.is_horizontal_edge() {
            self.screen.width_inches
        } else {
            self.screen.height_inches
        }
    }
}

// =============================================================================
// OVERLAP
// =============================================================================

/// Inclusive range of border cell indices, 1-based in interior index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorderRange {
    pub first: usize,
    pub last: usize,
}

#[allow(clippy::len_without_is_empty)]
impl BorderRange {
    /// Build a range, or `None` if `first > last` or `first == 0`.
    #[must_use]
    pub fn new(first: usize, last: usize) -> Option<Self> {
        (first >= 1 && first <= last).then_some(Self { first, last })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// Which local edge touches the peer and which of its cells are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub direction: Direction,
    pub range: BorderRange,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverlapError {
    #[error("invalid geometry: {field} must be positive, got {value}")]
    InvalidGeometry { field: &'static str, value: f64 },
    #[error("grid has no cells along the {0:?} edge")]
    EmptyEdge(Direction),
    #[error("screens do not overlap along the {0:?} edge")]
    NoOverlap(Direction),
}

fn positive(field: &'static str, value: f64) -> Result<(), OverlapError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(OverlapError::InvalidGeometry { field, value })
    }
}

/// Map a matched pair of swipes onto the local border.
///
/// `local` carries this device's geometry and the edge being paired; `dims`
/// and `cell_size` describe the local grid. The result is clipped to the
/// grid's valid index range along that edge.
///
/// # Errors
///
/// Returns [`OverlapError`] for zero, negative or non-finite geometry, for a
/// grid with no cells along the edge, or when the two edges do not intersect.
pub fn compute_overlap(
    local: &GestureSample,
    remote: &GestureSample,
    dims: GridDims,
    cell_size: f64,
) -> Result<Overlap, OverlapError> {
    local.screen.validate()?;
    remote.screen.validate()?;
    positive("cellSize", cell_size)?;

    let direction = local.direction;
    let cells_on_edge = if direction.is_horizontal_edge() { dims.columns } else { dims.rows };
    if cells_on_edge == 0 {
        return Err(OverlapError::EmptyEdge(direction));
    }

    // Remote edge start in local inches, from aligning the contact points.
    let remote_start = local.edge_offset_inches() - remote.edge_offset_inches();
    let remote_end = remote_start + remote.edge_length_inches();

    #[allow(clippy::cast_precision_loss)]
    let grid_extent = cells_on_edge as f64 * cell_size;
    let start = remote_start.max(0.0);
    let end = remote_end.min(local.edge_length_inches()).min(grid_extent);
    if end <= start {
        return Err(OverlapError::NoOverlap(direction));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (first, last) = {
        let first = (start / cell_size).floor() as usize + 1;
        let last = (end / cell_size).ceil() as usize;
        (first, last.min(cells_on_edge))
    };

    BorderRange::new(first, last)
        .map(|range| Overlap { direction, range })
        .ok_or(OverlapError::NoOverlap(direction))
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod tests;
