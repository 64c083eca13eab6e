//! Spatial extents and grid partitioning.
//!
//! Provides the [`Extent`] bounding rectangle, the [`GridSpec`] row/column
//! description, and [`partition`], which subdivides an extent into a grid of
//! non-overlapping tiles for data-parallel processing.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced when constructing extents or grids.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtentError {
    /// The rectangle is degenerate (zero or negative span on an axis).
    #[error("invalid extent: ({x_min}, {y_min}, {x_max}, {y_max}) must have x_min < x_max and y_min < y_max")]
    InvalidExtent {
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
    },

    /// Grid dimensions must both be positive.
    #[error("invalid partition: {rows} rows x {cols} cols")]
    InvalidPartition { rows: u32, cols: u32 },
}

/// An axis-aligned bounding rectangle in map units.
///
/// Invariant: `x_min < x_max` and `y_min < y_max`, enforced by [`Extent::new`].
/// Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Extent {
    /// Creates a validated extent.
    ///
    /// # Errors
    ///
    /// Returns [`ExtentError::InvalidExtent`] if either axis has a zero or
    /// negative span, or any bound is not finite.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, ExtentError> {
        let finite =
            x_min.is_finite() && y_min.is_finite() && x_max.is_finite() && y_max.is_finite();
        if !finite || x_min >= x_max || y_min >= y_max {
            return Err(ExtentError::InvalidExtent {
                x_min,
                y_min,
                x_max,
                y_max,
            });
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Width of the extent along the x axis.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the extent along the y axis.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Area covered by the extent.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Smallest extent covering both `self` and `other`.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Whether the open interiors of two extents overlap.
    ///
    /// Extents that merely share an edge do not overlap; adjacent grid tiles
    /// share their boundary coordinates.
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.x_min < other.x_max
            && other.x_min < self.x_max
            && self.y_min < other.y_max
            && other.y_min < self.y_max
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

/// Row/column dimensions for subdividing an extent.
///
/// Both dimensions are positive; `GridSpec::new(0, _)` is rejected at
/// construction so that [`partition`] itself never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    rows: u32,
    cols: u32,
}

impl GridSpec {
    /// Creates a validated grid description.
    ///
    /// # Errors
    ///
    /// Returns [`ExtentError::InvalidPartition`] if either dimension is zero.
    pub fn new(rows: u32, cols: u32) -> Result<Self, ExtentError> {
        if rows == 0 || cols == 0 {
            return Err(ExtentError::InvalidPartition { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Total number of tiles the grid produces.
    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.rows * self.cols
    }
}

/// One rectangular portion of a subdivided extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTile {
    /// Row-major tile index, starting at 1.
    pub index: u32,

    /// The tile's sub-extent.
    pub extent: Extent,
}

/// Subdivides `extent` into `rows x cols` uniform tiles.
///
/// Tiles are indexed row-major starting at 1, rows running bottom-up and
/// columns left-to-right. Subdivision is uniform along each axis with no
/// remainder redistribution; interior edges are shared between neighbors and
/// outer edges coincide with the input extent, so the tiles cover the extent
/// exactly with no overlap and no gap.
///
/// Pure and deterministic: identical inputs always yield identical tiles.
pub fn partition(extent: &Extent, grid: &GridSpec) -> Vec<GridTile> {
    let tile_width = extent.width() / grid.cols() as f64;
    let tile_height = extent.height() / grid.rows() as f64;

    let mut tiles = Vec::with_capacity(grid.tile_count() as usize);
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let index = row * grid.cols() + col + 1;
            let x_min = extent.x_min + col as f64 * tile_width;
            let y_min = extent.y_min + row as f64 * tile_height;
            // Snap the outer edges to the input extent so the tiling covers
            // it exactly; interior edges reuse the neighbor's expression.
            let x_max = if col + 1 == grid.cols() {
                extent.x_max
            } else {
                extent.x_min + (col + 1) as f64 * tile_width
            };
            let y_max = if row + 1 == grid.rows() {
                extent.y_max
            } else {
                extent.y_min + (row + 1) as f64 * tile_height
            };
            tiles.push(GridTile {
                index,
                extent: Extent {
                    x_min,
                    y_min,
                    x_max,
                    y_max,
                },
            });
        }
    }
    tiles
}
