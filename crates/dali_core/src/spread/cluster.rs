//! Overfilled-bin clustering: 4-connected BFS plus descending-area sort
//! (spec.md §4.4 "Cluster formation").

use std::collections::VecDeque;

use dali_common::BlockId;

use super::grid::BinGrid;

/// One cluster of mutually-adjacent overfilled bins.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Bin-index coordinates `(bx, by)` belonging to the cluster.
    pub bins: Vec<(usize, usize)>,
    /// Total cell area across all bins in the cluster.
    pub total_cell_area: f64,
}

impl Cluster {
    /// The cluster's axis-aligned bounding bin-index box, inclusive.
    pub fn bin_bbox(&self) -> ((usize, usize), (usize, usize)) {
        let mut min_bx = usize::MAX;
        let mut min_by = usize::MAX;
        let mut max_bx = 0;
        let mut max_by = 0;
        for &(bx, by) in &self.bins {
            min_bx = min_bx.min(bx);
            min_by = min_by.min(by);
            max_bx = max_bx.max(bx);
            max_by = max_by.max(by);
        }
        ((min_bx, min_by), (max_bx, max_by))
    }
}

/// Finds all overfilled-bin clusters via 4-connected BFS, in row-major
/// bin-scan order for determinism, sorted by total cell area descending
/// (spec.md §4.4, and §5 "bin-cluster enumeration order (row-major)").
pub fn find_clusters(
    grid: &BinGrid,
    target: f64,
    rect_of: impl Fn(BlockId) -> dali_common::Rect,
) -> Vec<Cluster> {
    let mut overfilled = vec![false; grid.bins_x * grid.bins_y];
    for by in 0..grid.bins_y {
        for bx in 0..grid.bins_x {
            if grid.is_overfilled(bx, by, target, &rect_of) {
                overfilled[by * grid.bins_x + bx] = true;
            }
        }
    }

    let mut visited = vec![false; grid.bins_x * grid.bins_y];
    let mut clusters = Vec::new();
    for by in 0..grid.bins_y {
        for bx in 0..grid.bins_x {
            let i = by * grid.bins_x + bx;
            if !overfilled[i] || visited[i] {
                continue;
            }
            let mut bins = Vec::new();
            let mut queue = VecDeque::new();
            queue.push_back((bx, by));
            visited[i] = true;
            while let Some((cx, cy)) = queue.pop_front() {
                bins.push((cx, cy));
                let neighbors = [
                    (cx.wrapping_sub(1), cy),
                    (cx + 1, cy),
                    (cx, cy.wrapping_sub(1)),
                    (cx, cy + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx >= grid.bins_x || ny >= grid.bins_y {
                        continue;
                    }
                    let ni = ny * grid.bins_x + nx;
                    if overfilled[ni] && !visited[ni] {
                        visited[ni] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
            let total_cell_area = bins.iter().map(|&(bx, by)| grid.cell_area_in(bx, by)).sum();
            clusters.push(Cluster {
                bins,
                total_cell_area,
            });
        }
    }

    clusters.sort_by(|a, b| b.total_cell_area.partial_cmp(&a.total_cell_area).unwrap());
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::PlacementRegion;
    use dali_common::Rect;

    #[test]
    fn adjacent_overfilled_bins_merge() {
        let region = PlacementRegion::new(0.0, 0.0, 16.0, 8.0, 0.1, 0.1, 8.0).unwrap();
        let mut grid = BinGrid::new(region, 8.0, 1, &[]);
        grid.assign_block(BlockId::from_raw(0), Rect::new(0.0, 0.0, 7.9, 7.9));
        grid.assign_block(BlockId::from_raw(1), Rect::new(8.0, 0.0, 15.9, 7.9));
        let rects = [
            Rect::new(0.0, 0.0, 7.9, 7.9),
            Rect::new(8.0, 0.0, 15.9, 7.9),
        ];
        let clusters = find_clusters(&grid, 0.9, |id| rects[id.as_raw() as usize]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].bins.len(), 2);
    }

    #[test]
    fn sorted_descending_by_area() {
        let region = PlacementRegion::new(0.0, 0.0, 24.0, 8.0, 0.1, 0.1, 8.0).unwrap();
        let mut grid = BinGrid::new(region, 8.0, 1, &[]);
        // bin 0: small overfill, bin 2: large overfill, not adjacent.
        grid.assign_block(BlockId::from_raw(0), Rect::new(0.0, 0.0, 7.9, 7.9));
        grid.assign_block(BlockId::from_raw(1), Rect::new(16.0, 0.0, 23.9, 7.9));
        grid.assign_block(BlockId::from_raw(2), Rect::new(16.0, 0.0, 23.9, 7.9));
        let rects = [
            Rect::new(0.0, 0.0, 7.9, 7.9),
            Rect::new(16.0, 0.0, 23.9, 7.9),
            Rect::new(16.0, 0.0, 23.9, 7.9),
        ];
        let clusters = find_clusters(&grid, 0.5, |id| rects[id.as_raw() as usize]);
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].total_cell_area >= clusters[1].total_cell_area);
    }

    #[test]
    fn bbox_of_single_bin_cluster() {
        let c = Cluster {
            bins: vec![(2, 3)],
            total_cell_area: 1.0,
        };
        assert_eq!(c.bin_bbox(), ((2, 3), (2, 3)));
    }
}
