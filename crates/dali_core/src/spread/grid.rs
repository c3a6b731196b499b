//! Uniform bin grid with a 2-D white-space prefix sum (spec.md §4.4
//! "Grid-bin construction" / "Bin state update").

use dali_common::{BlockId, Rect};

use crate::row::PlacementRegion;

/// One density bin.
#[derive(Debug, Clone)]
struct Bin {
    area: f64,
    white_space: f64,
    all_terminal: bool,
    fixed_rects: Vec<Rect>,
    cell_area: f64,
    cell_list: Vec<BlockId>,
}

/// The uniform grid of density bins over a placement region, with a
/// constant-time rectangular white-space query via an inclusive 2-D
/// prefix sum (spec.md §4.4).
pub struct BinGrid {
    region: PlacementRegion,
    /// Number of bins along x.
    pub bins_x: usize,
    /// Number of bins along y.
    pub bins_y: usize,
    /// Bin width.
    pub bin_width: f64,
    /// Bin height.
    pub bin_height: f64,
    bins: Vec<Bin>,
    /// Inclusive prefix sum of white space, `(bins_y+1) x (bins_x+1)`.
    prefix_ws: Vec<f64>,
}

impl BinGrid {
    fn idx(&self, bx: usize, by: usize) -> usize {
        by * self.bins_x + bx
    }

    /// Builds a grid over `region`. Bin height is `row_height *
    /// bin_height_factor`; bin width is derived so the bin count in x
    /// equals the bin count in y (SPEC_FULL.md OQ-3). `fixed_rects` are
    /// the world-space footprints of every FIXED/COVER block.
    pub fn new(
        region: PlacementRegion,
        row_height: f64,
        bin_height_factor: u32,
        fixed_rects: &[Rect],
    ) -> Self {
        let bin_height = (row_height * bin_height_factor as f64).max(row_height);
        let bins_y = ((region.height / bin_height).ceil() as usize).max(1);
        let bin_width = (region.width / bins_y as f64).max(1e-9);
        let bins_x = ((region.width / bin_width).ceil() as usize).max(1);
        // bin_width was derived from bins_y directly, so bins_x == bins_y
        // except for floating point rounding at the boundary; recompute
        // bin_width from bins_x to close that gap exactly.
        let bins_x = bins_x.max(bins_y);
        let bin_width = region.width / bins_x as f64;

        let mut bins = Vec::with_capacity(bins_x * bins_y);
        for by in 0..bins_y {
            for _bx in 0..bins_x {
                let _ = by;
                bins.push(Bin {
                    area: bin_width * bin_height,
                    white_space: bin_width * bin_height,
                    all_terminal: false,
                    fixed_rects: Vec::new(),
                    cell_area: 0.0,
                    cell_list: Vec::new(),
                });
            }
        }

        let mut grid = Self {
            region,
            bins_x,
            bins_y,
            bin_width,
            bin_height,
            bins,
            prefix_ws: vec![0.0; (bins_x + 1) * (bins_y + 1)],
        };

        for rect in fixed_rects {
            grid.subtract_fixed(rect);
        }
        grid.rebuild_prefix_sum();
        grid
    }

    fn bin_rect(&self, bx: usize, by: usize) -> Rect {
        let llx = self.region.llx + bx as f64 * self.bin_width;
        let lly = self.region.lly + by as f64 * self.bin_height;
        Rect::new(llx, lly, llx + self.bin_width, lly + self.bin_height)
    }

    fn subtract_fixed(&mut self, rect: &Rect) {
        let (bx0, by0) = self.bin_index(rect.llx, rect.lly);
        let (bx1, by1) = self.bin_index(rect.urx, rect.ury);
        for by in by0..=by1.min(self.bins_y.saturating_sub(1)) {
            for bx in bx0..=bx1.min(self.bins_x.saturating_sub(1)) {
                let overlap = self.bin_rect(bx, by).overlap_area(rect);
                if overlap <= 0.0 {
                    continue;
                }
                let i = self.idx(bx, by);
                self.bins[i].white_space = (self.bins[i].white_space - overlap).max(0.0);
                self.bins[i].fixed_rects.push(*rect);
                if self.bins[i].white_space <= 1e-9 {
                    self.bins[i].all_terminal = true;
                }
            }
        }
    }

    fn bin_index(&self, x: f64, y: f64) -> (usize, usize) {
        let bx = (((x - self.region.llx) / self.bin_width) as isize)
            .clamp(0, self.bins_x as isize - 1) as usize;
        let by = (((y - self.region.lly) / self.bin_height) as isize)
            .clamp(0, self.bins_y as isize - 1) as usize;
        (bx, by)
    }

    fn rebuild_prefix_sum(&mut self) {
        let w = self.bins_x + 1;
        for by in 0..self.bins_y {
            for bx in 0..self.bins_x {
                let ws = self.bins[self.idx(bx, by)].white_space;
                let above = self.prefix_ws[by * w + (bx + 1)];
                let left = self.prefix_ws[(by + 1) * w + bx];
                let diag = self.prefix_ws[by * w + bx];
                self.prefix_ws[(by + 1) * w + (bx + 1)] = ws + above + left - diag;
            }
        }
    }

    /// Clears per-pass cell assignment state (cell_area, cell_list) on
    /// every bin, keeping the fixed-obstacle/white-space state.
    pub fn clear_cells(&mut self) {
        for b in &mut self.bins {
            b.cell_area = 0.0;
            b.cell_list.clear();
        }
    }

    /// Assigns a movable block (by its center) to the bin containing it,
    /// clamped to the grid bounds (spec.md §4.4 "Bin state update").
    pub fn assign_block(&mut self, block: BlockId, rect: Rect) {
        let (cx, cy) = rect.center();
        let (bx, by) = self.bin_index(cx, cy);
        let i = self.idx(bx, by);
        self.bins[i].cell_area += rect.area();
        self.bins[i].cell_list.push(block);
    }

    /// Whether the bin `(bx, by)` is overfilled (spec.md §4.4 rules a-c),
    /// given each assigned block's current world rectangle via `rect_of`.
    pub fn is_overfilled(
        &self,
        bx: usize,
        by: usize,
        target: f64,
        rect_of: impl Fn(BlockId) -> Rect,
    ) -> bool {
        let b = &self.bins[self.idx(bx, by)];
        if b.all_terminal && !b.cell_list.is_empty() {
            return true;
        }
        if b.white_space > 0.0 && b.cell_area / b.white_space > target {
            return true;
        }
        for &block in &b.cell_list {
            let r = rect_of(block);
            if b.fixed_rects.iter().any(|f| f.overlaps(&r)) {
                return true;
            }
        }
        false
    }

    /// The list of cells currently assigned to bin `(bx, by)`.
    pub fn cells_in(&self, bx: usize, by: usize) -> &[BlockId] {
        &self.bins[self.idx(bx, by)].cell_list
    }

    /// Total cell area assigned to bin `(bx, by)`.
    pub fn cell_area_in(&self, bx: usize, by: usize) -> f64 {
        self.bins[self.idx(bx, by)].cell_area
    }

    /// Whether bin `(bx, by)` has no residual white space.
    pub fn all_terminal(&self, bx: usize, by: usize) -> bool {
        self.bins[self.idx(bx, by)].all_terminal
    }

    /// The fixed obstacle rectangles overlapping bin `(bx, by)`.
    pub fn fixed_rects_in(&self, bx: usize, by: usize) -> &[Rect] {
        &self.bins[self.idx(bx, by)].fixed_rects
    }

    /// Whether bin `(bx, by)` has any fixed obstacle overlapping it.
    pub fn has_fixed(&self, bx: usize, by: usize) -> bool {
        !self.bins[self.idx(bx, by)].fixed_rects.is_empty()
    }

    /// Constant-time rectangular white-space query over the inclusive bin
    /// index range `[ll.0, ur.0] x [ll.1, ur.1]`.
    pub fn white_space_in(&self, ll: (usize, usize), ur: (usize, usize)) -> f64 {
        let w = self.bins_x + 1;
        let (bx0, by0) = ll;
        let (bx1, by1) = ur;
        let a = self.prefix_ws[(by1 + 1) * w + (bx1 + 1)];
        let b = self.prefix_ws[by0 * w + (bx1 + 1)];
        let c = self.prefix_ws[(by1 + 1) * w + bx0];
        let d = self.prefix_ws[by0 * w + bx0];
        a - b - c + d
    }

    /// The continuous rectangle covered by bin-index range `[ll, ur]`.
    pub fn point_rect(&self, ll: (usize, usize), ur: (usize, usize)) -> Rect {
        let bl = self.bin_rect(ll.0, ll.1);
        let br = self.bin_rect(ur.0, ur.1);
        Rect::new(bl.llx, bl.lly, br.urx, br.ury)
    }

    /// The placement region this grid covers.
    pub fn region(&self) -> &PlacementRegion {
        &self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_grid_has_matching_bin_counts() {
        let region = PlacementRegion::new(0.0, 0.0, 80.0, 64.0, 0.1, 0.1, 8.0).unwrap();
        let grid = BinGrid::new(region, 8.0, 8, &[]);
        assert_eq!(grid.bins_x, grid.bins_y);
    }

    #[test]
    fn full_grid_white_space_matches_region_area() {
        let region = PlacementRegion::new(0.0, 0.0, 80.0, 64.0, 0.1, 0.1, 8.0).unwrap();
        let grid = BinGrid::new(region, 8.0, 8, &[]);
        let ws = grid.white_space_in((0, 0), (grid.bins_x - 1, grid.bins_y - 1));
        assert!((ws - region.width * region.height).abs() < 1e-6);
    }

    #[test]
    fn fixed_rect_reduces_white_space() {
        let region = PlacementRegion::new(0.0, 0.0, 80.0, 64.0, 0.1, 0.1, 8.0).unwrap();
        let fixed = Rect::new(0.0, 0.0, 10.0, 64.0);
        let grid = BinGrid::new(region, 8.0, 8, &[fixed]);
        let ws = grid.white_space_in((0, 0), (grid.bins_x - 1, grid.bins_y - 1));
        assert!((ws - (region.width * region.height - fixed.area())).abs() < 1e-6);
    }

    #[test]
    fn overfill_detected_by_density() {
        let region = PlacementRegion::new(0.0, 0.0, 8.0, 8.0, 0.1, 0.1, 8.0).unwrap();
        let mut grid = BinGrid::new(region, 8.0, 1, &[]);
        grid.assign_block(BlockId::from_raw(0), Rect::new(0.0, 0.0, 7.9, 7.9));
        assert!(grid.is_overfilled(0, 0, 0.9, |_| Rect::new(0.0, 0.0, 7.9, 7.9)));
    }

    #[test]
    fn sparse_bin_not_overfilled() {
        let region = PlacementRegion::new(0.0, 0.0, 8.0, 8.0, 0.1, 0.1, 8.0).unwrap();
        let mut grid = BinGrid::new(region, 8.0, 1, &[]);
        grid.assign_block(BlockId::from_raw(0), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(!grid.is_overfilled(0, 0, 0.9, |_| Rect::new(0.0, 0.0, 1.0, 1.0)));
    }
}
