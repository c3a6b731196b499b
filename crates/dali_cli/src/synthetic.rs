//! Synthetic benchmark circuit for smoke-testing the pipeline without a
//! real LEF/DEF/Bookshelf front-end (spec.md §6.4).

use dali_core::design::PlacementStatus;
use dali_core::row::{PlacementRegion, Row, RowOrientation, RowSegment};
use dali_core::Circuit;

use dali_common::{Orientation, Rect};

/// Builds a chain of `n` identical 1x2 cells, each connected to the
/// next by a 2-pin net, laid out in a region sized for roughly 70%
/// utilization.
pub fn benchmark_circuit(n: usize, grid_x: f64, grid_y: f64) -> Circuit {
    let n = n.max(1);
    let mut circuit = Circuit::new(grid_x, grid_y);

    let row_height = 2.0;
    let cell_area = 1.0 * row_height * n as f64;
    let region_area = cell_area / 0.7;
    let rows_needed = ((n as f64).sqrt().ceil() as usize).max(1);
    let width = (region_area / (row_height * rows_needed as f64)).ceil().max(row_height);
    let height = row_height * rows_needed as f64;

    circuit.set_region(PlacementRegion::new(0.0, 0.0, width, height, grid_x, grid_y, row_height).unwrap());
    let mut y = 0.0;
    while y < height - 1e-9 {
        circuit
            .add_row(Row {
                lly: y,
                height: row_height,
                orientation: RowOrientation::N,
                p_well_height: 0.0,
                n_well_height: 0.0,
                segments: vec![RowSegment { llx: 0.0, width, blocks: Vec::new() }],
            })
            .unwrap();
        y += row_height;
    }

    let ct = circuit.add_block_type("CELL", 1.0, row_height).unwrap();
    let pin = circuit.add_pin_to_type(ct, "P", true).unwrap();
    circuit
        .add_pin_rect(ct, pin, Rect::new(0.0, row_height * 0.4, 0.2, row_height * 0.6))
        .unwrap();
    circuit.freeze_cell_type(ct).unwrap();

    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let id = circuit
            .add_block(&format!("c{i}"), ct, 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        ids.push(id);
    }
    for w in ids.windows(2) {
        let net = circuit.add_net(&format!("n{}_{}", w[0].as_raw(), w[1].as_raw()), 2, 1.0).unwrap();
        circuit.add_blk_pin_to_net(net, w[0], pin).unwrap();
        circuit.add_blk_pin_to_net(net, w[1], pin).unwrap();
    }

    circuit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_requested_cell_count() {
        let c = benchmark_circuit(10, 0.1, 0.1);
        assert_eq!(c.block_count(), 10);
        assert_eq!(c.net_count(), 9);
    }

    #[test]
    fn single_cell_has_no_nets() {
        let c = benchmark_circuit(1, 0.1, 0.1);
        assert_eq!(c.block_count(), 1);
        assert_eq!(c.net_count(), 0);
    }
}
