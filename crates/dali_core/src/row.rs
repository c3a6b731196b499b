//! The row model: `Row`, `RowSegment`, and `PlacementRegion` (spec.md §3).

use dali_common::BlockId;
use serde::{Deserialize, Serialize};

use crate::error::DaliResult;
use crate::tech::check_grid_multiple;

/// Row orientation: sites face up (`N`) or are mirrored vertically
/// (`FS`), per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOrientation {
    /// Sites face up.
    N,
    /// Sites mirrored vertically (alternating row convention).
    FS,
}

/// A contiguous, site-aligned run of placeable x positions within a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSegment {
    /// Lower-left x of the segment.
    pub llx: f64,
    /// Width of the segment.
    pub width: f64,
    /// Blocks currently assigned to this segment, left to right.
    pub blocks: Vec<BlockId>,
}

impl RowSegment {
    /// Upper-right x of the segment.
    pub fn urx(&self) -> f64 {
        self.llx + self.width
    }
}

/// One placement row (spec.md §3 Row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// Lower-left y of the row.
    pub lly: f64,
    /// Row height.
    pub height: f64,
    /// Orientation, alternating by convention between adjacent rows.
    pub orientation: RowOrientation,
    /// Height reserved for the P-well strip.
    pub p_well_height: f64,
    /// Height reserved for the N-well strip.
    pub n_well_height: f64,
    /// The row's placeable segments.
    pub segments: Vec<RowSegment>,
}

impl Row {
    /// Upper edge of the row.
    pub fn ury(&self) -> f64 {
        self.lly + self.height
    }
}

/// The immutable placement region: a rectangle whose integer width/height
/// are exact multiples of the placement grid and of the row height, with
/// every row fitting entirely inside it (spec.md §3 PlacementRegion).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementRegion {
    /// Lower-left x.
    pub llx: f64,
    /// Lower-left y.
    pub lly: f64,
    /// Region width.
    pub width: f64,
    /// Region height.
    pub height: f64,
}

impl PlacementRegion {
    /// Builds a region, checking that its width/height are exact
    /// multiples of `grid_x`/`grid_y` and of `row_height`.
    pub fn new(
        llx: f64,
        lly: f64,
        width: f64,
        height: f64,
        grid_x: f64,
        grid_y: f64,
        row_height: f64,
    ) -> DaliResult<Self> {
        check_grid_multiple("placement region width", width, 'x', grid_x)?;
        check_grid_multiple("placement region height", height, 'y', grid_y)?;
        check_grid_multiple("placement region height", height, 'y', row_height)?;
        Ok(Self {
            llx,
            lly,
            width,
            height,
        })
    }

    /// Upper-right x.
    pub fn urx(&self) -> f64 {
        self.llx + self.width
    }

    /// Upper-right y.
    pub fn ury(&self) -> f64 {
        self.lly + self.height
    }

    /// Whether `row` fits entirely within this region.
    pub fn contains_row(&self, row: &Row) -> bool {
        row.lly >= self.lly - 1e-9 && row.ury() <= self.ury() + 1e-9
    }
}
