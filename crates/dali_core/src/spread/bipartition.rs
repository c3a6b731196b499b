//! Recursive bipartition and leaf placement (spec.md §4.4 "Recursive
//! bipartition" / "Cell partition" / "Leaf placement"), and the
//! `spread_pass` entry point that drives the whole bin-state -> cluster
//! -> bipartition cycle to termination.

use std::collections::VecDeque;

use dali_common::{BlockId, Rect};

use crate::circuit::Circuit;
use crate::config::PlacerConfig;
use crate::design::PlacementStatus;

use super::cluster::{find_clusters, Cluster};
use super::grid::BinGrid;

/// A bin-index rectangle paired with its continuous cell rectangle and
/// assigned cell set (spec.md §4.4 "Box").
struct Box_ {
    ll_idx: (usize, usize),
    ur_idx: (usize, usize),
    ll_pt: (f64, f64),
    ur_pt: (f64, f64),
    cells: Vec<BlockId>,
}

fn box_cell_area(circuit: &Circuit, cells: &[BlockId]) -> f64 {
    cells
        .iter()
        .map(|&b| circuit.block_width(b) * circuit.block_height(b))
        .sum()
}

/// Expands `bbox` outward one ring at a time until its filling rate is
/// `<= target` (or the grid boundary is reached), then builds the seed
/// `Box_` (spec.md §4.4 "Recursive bipartition").
fn seed_box(grid: &BinGrid, circuit: &Circuit, bbox: ((usize, usize), (usize, usize)), target: f64) -> Box_ {
    let mut ll = bbox.0;
    let mut ur = bbox.1;
    loop {
        let ws = grid.white_space_in(ll, ur);
        let cells = collect_cells(grid, ll, ur);
        let area = box_cell_area(circuit, &cells);
        if ws <= 0.0 || area / ws <= target {
            let ll_pt = grid.point_rect(ll, ur).rect_ll();
            let ur_pt = grid.point_rect(ll, ur).rect_ur();
            return Box_ {
                ll_idx: ll,
                ur_idx: ur,
                ll_pt,
                ur_pt,
                cells,
            };
        }
        let new_ll = (ll.0.saturating_sub(1), ll.1.saturating_sub(1));
        let new_ur = ((ur.0 + 1).min(grid.bins_x - 1), (ur.1 + 1).min(grid.bins_y - 1));
        if new_ll == ll && new_ur == ur {
            let ll_pt = grid.point_rect(ll, ur).rect_ll();
            let ur_pt = grid.point_rect(ll, ur).rect_ur();
            let cells = collect_cells(grid, ll, ur);
            return Box_ {
                ll_idx: ll,
                ur_idx: ur,
                ll_pt,
                ur_pt,
                cells,
            };
        }
        ll = new_ll;
        ur = new_ur;
    }
}

trait RectLlUr {
    fn rect_ll(&self) -> (f64, f64);
    fn rect_ur(&self) -> (f64, f64);
}
impl RectLlUr for Rect {
    fn rect_ll(&self) -> (f64, f64) {
        (self.llx, self.lly)
    }
    fn rect_ur(&self) -> (f64, f64) {
        (self.urx, self.ury)
    }
}

fn collect_cells(grid: &BinGrid, ll: (usize, usize), ur: (usize, usize)) -> Vec<BlockId> {
    let mut out = Vec::new();
    for by in ll.1..=ur.1 {
        for bx in ll.0..=ur.0 {
            out.extend_from_slice(grid.cells_in(bx, by));
        }
    }
    out
}

/// Splits `cells` into `(low, high)` such that the cell area below the
/// returned cut line is approximately `r` of the total, by 20 bisection
/// iterations over the cut axis (spec.md §4.4 "Cell partition").
fn cell_partition(
    circuit: &Circuit,
    cells: &[BlockId],
    axis_x: bool,
    lo: f64,
    hi: f64,
    r: f64,
) -> (Vec<BlockId>, Vec<BlockId>, f64) {
    let total: f64 = box_cell_area(circuit, cells);
    let target = r * total;
    let coord = |b: BlockId| -> f64 {
        let (cx, cy) = circuit.block_rect(b).center();
        if axis_x {
            cx
        } else {
            cy
        }
    };
    let mut low = lo;
    let mut high = hi;
    let mut cut = (lo + hi) / 2.0;
    for _ in 0..20 {
        cut = (low + high) / 2.0;
        let area_below: f64 = cells
            .iter()
            .filter(|&&b| coord(b) < cut)
            .map(|&b| circuit.block_width(b) * circuit.block_height(b))
            .sum();
        if area_below < target {
            low = cut;
        } else {
            high = cut;
        }
    }
    let (below, above): (Vec<BlockId>, Vec<BlockId>) =
        cells.iter().partition(|&&b| coord(b) < cut);
    (below, above, cut)
}

/// Recursively bisects a cell-free box with row-height-aligned horizontal
/// cuts until each leaf holds at most one cell, placing each cell at the
/// center of its leaf (spec.md §4.4 "Leaf placement").
fn leaf_place(circuit: &mut Circuit, cells: &[BlockId], ll_pt: (f64, f64), ur_pt: (f64, f64), row_height: f64) {
    if cells.len() <= 1 {
        if let Some(&block) = cells.first() {
            let cx = (ll_pt.0 + ur_pt.0) / 2.0;
            let cy = (ll_pt.1 + ur_pt.1) / 2.0;
            let w = circuit.block_width(block);
            let h = circuit.block_height(block);
            let x = cx - w / 2.0;
            let mut y = cy - h / 2.0;
            if row_height > 0.0 {
                y = (y / row_height).round() * row_height;
            }
            let b = circuit.block_mut(block);
            b.x = x;
            b.y = y;
        }
        return;
    }
    let width = ur_pt.0 - ll_pt.0;
    let height = ur_pt.1 - ll_pt.1;
    if width >= height {
        let (below, above, cut) = cell_partition(circuit, cells, true, ll_pt.0, ur_pt.0, 0.5);
        leaf_place(circuit, &below, ll_pt, (cut, ur_pt.1), row_height);
        leaf_place(circuit, &above, (cut, ll_pt.1), ur_pt, row_height);
    } else {
        let mut mid = ll_pt.1 + height / 2.0;
        if row_height > 0.0 {
            mid = (mid / row_height).round() * row_height;
            mid = mid.clamp(ll_pt.1 + 1e-6, ur_pt.1 - 1e-6);
        }
        let (below, above): (Vec<BlockId>, Vec<BlockId>) = cells
            .iter()
            .partition(|&&b| circuit.block_rect(b).center().1 < mid);
        leaf_place(circuit, &below, ll_pt, (ur_pt.0, mid), row_height);
        leaf_place(circuit, &above, (ll_pt.0, mid), ur_pt, row_height);
    }
}

/// Splits a box containing a single bin with fixed obstacles: chooses the
/// direction with more obstacle-boundary lines and cuts at the first such
/// line (simplified to the bin's sole/first fixed rectangle's leading
/// edge on its longer side).
fn split_single_bin_with_obstacle(circuit: &Circuit, b: Box_, obstacle: Rect) -> (Box_, Box_) {
    let width = b.ur_pt.0 - b.ll_pt.0;
    let height = b.ur_pt.1 - b.ll_pt.1;
    if width >= height {
        let cut = obstacle.llx.clamp(b.ll_pt.0 + 1e-6, b.ur_pt.0 - 1e-6);
        let (below, above, _) = cell_partition(circuit, &b.cells, true, b.ll_pt.0, b.ur_pt.0, {
            (cut - b.ll_pt.0) / width
        });
        (
            Box_ { ll_idx: b.ll_idx, ur_idx: b.ur_idx, ll_pt: b.ll_pt, ur_pt: (cut, b.ur_pt.1), cells: below },
            Box_ { ll_idx: b.ll_idx, ur_idx: b.ur_idx, ll_pt: (cut, b.ll_pt.1), ur_pt: b.ur_pt, cells: above },
        )
    } else {
        let cut = obstacle.lly.clamp(b.ll_pt.1 + 1e-6, b.ur_pt.1 - 1e-6);
        let (below, above, _) = cell_partition(circuit, &b.cells, false, b.ll_pt.1, b.ur_pt.1, {
            (cut - b.ll_pt.1) / height
        });
        (
            Box_ { ll_idx: b.ll_idx, ur_idx: b.ur_idx, ll_pt: b.ll_pt, ur_pt: (b.ur_pt.0, cut), cells: below },
            Box_ { ll_idx: b.ll_idx, ur_idx: b.ur_idx, ll_pt: (b.ll_pt.0, cut), ur_pt: b.ur_pt, cells: above },
        )
    }
}

/// Drains the box queue for one cluster, splitting until every box is a
/// leaf or a fixed-free single bin (spec.md §4.4).
fn drain_boxes(circuit: &mut Circuit, grid: &BinGrid, seed: Box_, row_height: f64) {
    let mut queue = VecDeque::new();
    queue.push_back(seed);
    while let Some(b) = queue.pop_front() {
        if b.ll_idx == b.ur_idx {
            if !grid.has_fixed(b.ll_idx.0, b.ll_idx.1) {
                leaf_place(circuit, &b.cells, b.ll_pt, b.ur_pt, row_height);
            } else if let Some(obstacle) = first_fixed_rect(grid, b.ll_idx.0, b.ll_idx.1) {
                // The sub-boxes still index the same single bin, so they
                // cannot be re-queued (that would loop on the same
                // obstacle forever); place each half directly instead.
                let (lo, hi) = split_single_bin_with_obstacle(circuit, b, obstacle);
                leaf_place(circuit, &lo.cells, lo.ll_pt, lo.ur_pt, row_height);
                leaf_place(circuit, &hi.cells, hi.ll_pt, hi.ur_pt, row_height);
            }
            continue;
        }
        let span_x = b.ur_idx.0 - b.ll_idx.0;
        let span_y = b.ur_idx.1 - b.ll_idx.1;
        let (lo, hi) = if span_x >= span_y {
            split_along_x(circuit, grid, b)
        } else {
            split_along_y(circuit, grid, b)
        };
        queue.push_back(lo);
        queue.push_back(hi);
    }
}

fn first_fixed_rect(grid: &BinGrid, bx: usize, by: usize) -> Option<Rect> {
    grid.fixed_rects_in(bx, by).first().copied()
}

fn split_along_x(circuit: &Circuit, grid: &BinGrid, b: Box_) -> (Box_, Box_) {
    let mid_bx = find_balanced_split(grid, b.ll_idx, b.ur_idx, true);
    let ll_pt = b.ll_pt;
    let ur_pt = b.ur_pt;
    let ws_lo = grid.white_space_in(b.ll_idx, (mid_bx, b.ur_idx.1));
    let ws_hi = grid.white_space_in((mid_bx + 1, b.ll_idx.1), b.ur_idx);
    let total_ws = ws_lo + ws_hi;
    let r = if total_ws > 0.0 { ws_lo / total_ws } else { 0.5 };

    let cut_x = grid.point_rect((mid_bx, b.ll_idx.1), (mid_bx, b.ll_idx.1)).urx;
    let (low_cells, high_cells) = if total_ws > 0.0 && (ws_lo / total_ws <= 0.01 || ws_hi / total_ws <= 0.01) {
        if ws_lo <= ws_hi {
            (Vec::new(), b.cells)
        } else {
            (b.cells, Vec::new())
        }
    } else {
        let (below, above, _) = cell_partition(circuit, &b.cells, true, ll_pt.0, ur_pt.0, r);
        (below, above)
    };

    (
        Box_ {
            ll_idx: b.ll_idx,
            ur_idx: (mid_bx, b.ur_idx.1),
            ll_pt,
            ur_pt: (cut_x, ur_pt.1),
            cells: low_cells,
        },
        Box_ {
            ll_idx: (mid_bx + 1, b.ll_idx.1),
            ur_idx: b.ur_idx,
            ll_pt: (cut_x, ll_pt.1),
            ur_pt,
            cells: high_cells,
        },
    )
}

fn split_along_y(circuit: &Circuit, grid: &BinGrid, b: Box_) -> (Box_, Box_) {
    let mid_by = find_balanced_split(grid, b.ll_idx, b.ur_idx, false);
    let ll_pt = b.ll_pt;
    let ur_pt = b.ur_pt;
    let ws_lo = grid.white_space_in(b.ll_idx, (b.ur_idx.0, mid_by));
    let ws_hi = grid.white_space_in((b.ll_idx.0, mid_by + 1), b.ur_idx);
    let total_ws = ws_lo + ws_hi;
    let r = if total_ws > 0.0 { ws_lo / total_ws } else { 0.5 };

    let cut_y = grid.point_rect((b.ll_idx.0, mid_by), (b.ll_idx.0, mid_by)).ury;
    let (low_cells, high_cells) = if total_ws > 0.0 && (ws_lo / total_ws <= 0.01 || ws_hi / total_ws <= 0.01) {
        if ws_lo <= ws_hi {
            (Vec::new(), b.cells)
        } else {
            (b.cells, Vec::new())
        }
    } else {
        let (below, above, _) = cell_partition(circuit, &b.cells, false, ll_pt.1, ur_pt.1, r);
        (below, above)
    };

    (
        Box_ {
            ll_idx: b.ll_idx,
            ur_idx: (b.ur_idx.0, mid_by),
            ll_pt,
            ur_pt: (ur_pt.0, cut_y),
            cells: low_cells,
        },
        Box_ {
            ll_idx: (b.ll_idx.0, mid_by + 1),
            ur_idx: b.ur_idx,
            ll_pt: (ll_pt.0, cut_y),
            ur_pt,
            cells: high_cells,
        },
    )
}

/// Finds the bin index along the split axis that divides the box's white
/// space as close to 50/50 as possible (spec.md §4.4).
fn find_balanced_split(grid: &BinGrid, ll: (usize, usize), ur: (usize, usize), axis_x: bool) -> usize {
    let total = grid.white_space_in(ll, ur);
    let half = total / 2.0;
    let (lo, hi) = if axis_x { (ll.0, ur.0) } else { (ll.1, ur.1) };
    let mut best = lo;
    let mut best_diff = f64::INFINITY;
    for cand in lo..hi {
        let ws = if axis_x {
            grid.white_space_in(ll, (cand, ur.1))
        } else {
            grid.white_space_in(ll, (ur.0, cand))
        };
        let diff = (ws - half).abs();
        if diff < best_diff {
            best_diff = diff;
            best = cand;
        }
    }
    best
}

/// Runs one full bin-state -> cluster -> bipartition cycle to
/// termination: rebuilds the bin grid, finds overfilled clusters, spreads
/// each via recursive bipartition, and repeats until no cluster is
/// overfilled (spec.md §4.4 "Termination").
pub fn spread_pass(circuit: &mut Circuit, config: &PlacerConfig) {
    let Some(region) = circuit.region().copied() else { return };
    let row_height = circuit.rows().first().map(|r| r.height).unwrap_or(0.0);

    loop {
        let fixed_rects: Vec<Rect> = circuit
            .blocks()
            .filter(|(_, b)| !b.is_movable())
            .map(|(id, _)| circuit.block_rect(id))
            .collect();
        let mut grid = BinGrid::new(region, row_height.max(1.0), config.bin_height_factor, &fixed_rects);

        let movable: Vec<BlockId> = circuit.movable_blocks().collect();
        for &id in &movable {
            grid.assign_block(id, circuit.block_rect(id));
        }

        let rect_of = |id: BlockId| circuit.block_rect(id);
        let clusters: Vec<Cluster> = find_clusters(&grid, config.target_filling_rate, rect_of);
        if clusters.is_empty() {
            break;
        }
        for cluster in clusters {
            let bbox = cluster.bin_bbox();
            let seed = seed_box(&grid, circuit, bbox, config.target_filling_rate);
            drain_boxes(circuit, &grid, seed, row_height);
            // Re-sync the grid's cell assignment for subsequent clusters
            // in this same round (cheap relative to a full rebuild).
            grid.clear_cells();
            for &id in &movable {
                grid.assign_block(id, circuit.block_rect(id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::PlacementRegion;
    use dali_common::Orientation;

    fn packed_circuit(n: usize) -> Circuit {
        let mut c = Circuit::new(0.1, 0.1);
        c.set_region(PlacementRegion::new(0.0, 0.0, 16.0, 8.0, 0.1, 0.1, 8.0).unwrap());
        c.add_row(crate::row::Row {
            lly: 0.0,
            height: 8.0,
            orientation: crate::row::RowOrientation::N,
            p_well_height: 0.0,
            n_well_height: 0.0,
            segments: vec![],
        })
        .unwrap();
        let ct = c.add_block_type("BUF", 1.0, 8.0).unwrap();
        let pin = c.add_pin_to_type(ct, "A", true).unwrap();
        c.add_pin_rect(ct, pin, Rect::new(0.0, 0.0, 1.0, 8.0)).unwrap();
        c.freeze_cell_type(ct).unwrap();
        for i in 0..n {
            c.add_block(
                &format!("u{i}"),
                ct,
                1.0, // all crammed at the same x: guaranteed overfill
                0.0,
                PlacementStatus::Unplaced,
                Orientation::N,
            )
            .unwrap();
        }
        c
    }

    #[test]
    fn spreading_relieves_overfill() {
        let mut c = packed_circuit(8);
        let cfg = PlacerConfig::default();
        spread_pass(&mut c, &cfg);

        let region = c.region().copied().unwrap();
        let row_height = c.rows()[0].height;
        let fixed_rects: Vec<Rect> = Vec::new();
        let mut grid = BinGrid::new(region, row_height, cfg.bin_height_factor, &fixed_rects);
        let movable: Vec<BlockId> = c.movable_blocks().collect();
        for &id in &movable {
            grid.assign_block(id, c.block_rect(id));
        }
        let rect_of = |id: BlockId| c.block_rect(id);
        let clusters = find_clusters(&grid, cfg.target_filling_rate, rect_of);
        assert!(clusters.is_empty(), "expected no remaining overfilled clusters");
    }

    #[test]
    fn no_region_is_a_no_op() {
        let mut c = Circuit::new(0.1, 0.1);
        let cfg = PlacerConfig::default();
        spread_pass(&mut c, &cfg); // must not panic
    }
}
