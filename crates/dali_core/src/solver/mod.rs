//! Quadratic Solver (spec.md §4.3): B2B system assembly plus
//! Jacobi-preconditioned CG, driven by a per-axis outer convergence loop.

pub mod b2b;
pub mod cg;

use std::collections::HashMap;

use dali_common::BlockId;

use crate::bound_tracker::update_net_extrema_cache;
use crate::circuit::Circuit;
use crate::config::PlacerConfig;
use crate::design::PinRef;
use b2b::Axis;

/// Cap on the per-axis rebuild/solve/compare loop of spec.md §4.3,
/// independent of the driver's outer anchor loop (`PlacerConfig::
/// max_outer_iters`).
const AXIS_INNER_ITER_CAP: usize = 30;

fn movable_index_map(circuit: &Circuit) -> HashMap<BlockId, usize> {
    circuit
        .movable_blocks()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect()
}

/// Average movable-block width/height, the basis of the per-axis epsilon
/// (SPEC_FULL.md OQ-2). Falls back to `1.0` grid unit with no movable
/// blocks.
fn axis_epsilon(circuit: &Circuit, axis: Axis) -> f64 {
    let movable: Vec<BlockId> = circuit.movable_blocks().collect();
    if movable.is_empty() {
        return 1.0;
    }
    let sum: f64 = movable
        .iter()
        .map(|&id| match axis {
            Axis::X => circuit.block_width(id),
            Axis::Y => circuit.block_height(id),
        })
        .sum();
    0.01 * sum / movable.len() as f64
}

fn axis_coord(circuit: &Circuit, pin_ref: PinRef, axis: Axis) -> f64 {
    match pin_ref {
        PinRef::Block(block, pin) => {
            let (x, y) = circuit.pin_position(block, pin);
            if axis == Axis::X {
                x
            } else {
                y
            }
        }
        PinRef::Io(io) => {
            let p = circuit.io_pin(io);
            if axis == Axis::X {
                p.x
            } else {
                p.y
            }
        }
    }
}

/// Sum of the per-net weighted span along `axis` only, using each net's
/// currently cached extrema.
fn axis_hpwl(circuit: &Circuit, axis: Axis) -> f64 {
    circuit
        .nets()
        .map(|(_, net)| {
            if net.pins.len() < 2 {
                return 0.0;
            }
            let Some(extrema) = net.extrema else { return 0.0 };
            let (i_max, i_min) = match axis {
                Axis::X => (extrema.index_max_x, extrema.index_min_x),
                Axis::Y => (extrema.index_max_y, extrema.index_min_y),
            };
            let pmax = axis_coord(circuit, net.pins[i_max], axis);
            let pmin = axis_coord(circuit, net.pins[i_min], axis);
            net.weight * (pmax - pmin)
        })
        .sum()
}

fn write_back(
    circuit: &mut Circuit,
    axis: Axis,
    movable_index: &HashMap<BlockId, usize>,
    x: &[f64],
) {
    let region = circuit.region().copied();
    let avg_dim = axis_epsilon(circuit, axis) / 0.01; // recover the unscaled average dimension
    for (&block, &idx) in movable_index {
        let mut v = x[idx];
        if let Some(region) = &region {
            let (lo, hi, dim) = match axis {
                Axis::X => (region.llx, region.urx(), circuit.block_width(block)),
                Axis::Y => (region.lly, region.ury(), circuit.block_height(block)),
            };
            if v < lo {
                v = lo + avg_dim.min(hi - lo - dim).max(0.0);
            } else if v > hi - dim {
                v = (hi - dim - avg_dim).max(lo);
            }
        }
        let b = circuit.block_mut(block);
        if axis == Axis::X {
            b.x = v;
        } else {
            b.y = v;
        }
    }
}

/// Runs the per-axis outer loop of spec.md §4.3: rebuild the B2B system
/// from fresh extrema, CG-solve, write back coordinates (clamping any
/// block that left the region inward by one average cell dimension), and
/// repeat until HPWL along this axis converges to `config.hpwl_precision`
/// or the inner iteration cap is hit. When `anchors` is `Some`, every
/// rebuild also includes the anchor-pull term with weight `alpha`
/// (spec.md §4.3 "Anchor extension").
pub fn solve_axis(
    circuit: &mut Circuit,
    axis: Axis,
    config: &PlacerConfig,
    anchors: Option<&HashMap<BlockId, (f64, f64)>>,
    alpha: f64,
) -> f64 {
    let movable_index = movable_index_map(circuit);
    if movable_index.is_empty() {
        return 0.0;
    }
    let mut prev_hpwl: Option<f64> = None;
    let mut last_hpwl = 0.0;

    for _ in 0..AXIS_INNER_ITER_CAP {
        let net_ids: Vec<_> = circuit.nets().map(|(id, _)| id).collect();
        for id in net_ids {
            update_net_extrema_cache(circuit, id);
        }
        let eps = axis_epsilon(circuit, axis);
        let mut system = b2b::build_axis_system(circuit, axis, &movable_index, eps);
        if let Some(anchors) = anchors {
            b2b::add_anchor_terms(&mut system, circuit, axis, &movable_index, anchors, alpha, eps);
        }

        let mut x0 = vec![0.0; movable_index.len()];
        for (&block, &idx) in &movable_index {
            let b = circuit.block(block);
            x0[idx] = if axis == Axis::X { b.x } else { b.y };
        }
        cg::solve(&system, &mut x0, config.cg_precision, config.max_cg_iters);
        write_back(circuit, axis, &movable_index, &x0);

        let net_ids: Vec<_> = circuit.nets().map(|(id, _)| id).collect();
        for id in net_ids {
            update_net_extrema_cache(circuit, id);
        }
        last_hpwl = axis_hpwl(circuit, axis);
        if let Some(prev) = prev_hpwl {
            if prev > 0.0 && (1.0 - last_hpwl / prev).abs() <= config.hpwl_precision {
                break;
            }
        }
        prev_hpwl = Some(last_hpwl);
    }
    last_hpwl
}
