//! Bound-to-bound (B2B) sparse system assembly (spec.md §4.3).
//!
//! Builds one [`LinearSystem`] per axis from the current `Circuit` state:
//! only pairs touching a net's cached extrema are kept, matching the
//! B2B pair-selection rule. The same builder serves both the anchor-free
//! first pass and the anchor-pulled re-solve; the anchor term is just an
//! extra set of diagonal/RHS contributions appended after the net terms
//! (grounded on `mcpnr-placement`'s single `AnalyticWirelengthProblem`
//! type reused across passes, see DESIGN.md).

use std::collections::HashMap;

use dali_common::BlockId;

use crate::circuit::Circuit;
use crate::design::PinRef;

/// Which coordinate axis a system is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// x.
    X,
    /// y.
    Y,
}

/// A small constant added to every diagonal to guarantee positive
/// definiteness even when a movable Block has no incident nets.
const DIAG_REGULARIZATION: f64 = 1e-6;

/// A symmetric sparse linear system `A x = b` in coordinate form, indexed
/// by compacted movable-block indices (not `BlockId`s).
#[derive(Debug, Clone)]
pub struct LinearSystem {
    /// Number of unknowns.
    pub n: usize,
    /// Diagonal entries.
    pub diag: Vec<f64>,
    /// Off-diagonal entries, keyed `(min(i,j), max(i,j))`.
    pub off: HashMap<(usize, usize), f64>,
    /// Right-hand side.
    pub rhs: Vec<f64>,
}

impl LinearSystem {
    fn new(n: usize) -> Self {
        Self {
            n,
            diag: vec![DIAG_REGULARIZATION; n],
            off: HashMap::new(),
            rhs: vec![0.0; n],
        }
    }

    fn add_edge(&mut self, i: usize, j: usize, w: f64) {
        self.diag[i] += w;
        self.diag[j] += w;
        let key = if i < j { (i, j) } else { (j, i) };
        *self.off.entry(key).or_insert(0.0) -= w;
    }

    /// Computes `A * x`.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        let mut y: Vec<f64> = self
            .diag
            .iter()
            .zip(x.iter())
            .map(|(d, xi)| d * xi)
            .collect();
        for (&(i, j), &w) in &self.off {
            y[i] += w * x[j];
            y[j] += w * x[i];
        }
        y
    }
}

/// Endpoint of a pin on one axis: either an unknown (movable) with a
/// constant orientation offset, or a known absolute position (fixed).
enum Endpoint {
    Movable { idx: usize, offset: f64 },
    Fixed { pos: f64 },
}

fn endpoint(
    circuit: &Circuit,
    pin_ref: PinRef,
    axis: Axis,
    movable_index: &HashMap<BlockId, usize>,
) -> Endpoint {
    match pin_ref {
        PinRef::Block(block, pin) => {
            let (dx, dy) = {
                let b = circuit.block(block);
                let ct = circuit.cell_type(b.cell_type);
                ct.pin(pin).offset(b.orientation)
            };
            let offset = if axis == Axis::X { dx } else { dy };
            if let Some(&idx) = movable_index.get(&block) {
                Endpoint::Movable { idx, offset }
            } else {
                let b = circuit.block(block);
                let pos = if axis == Axis::X { b.x } else { b.y } + offset;
                Endpoint::Fixed { pos }
            }
        }
        PinRef::Io(io) => {
            let p = circuit.io_pin(io);
            let pos = if axis == Axis::X { p.x } else { p.y };
            Endpoint::Fixed { pos }
        }
    }
}

fn apply_pair(system: &mut LinearSystem, a: Endpoint, b: Endpoint, w: f64) {
    if w <= 0.0 || !w.is_finite() {
        return;
    }
    match (a, b) {
        (Endpoint::Movable { idx: i, offset: oi }, Endpoint::Movable { idx: j, offset: oj }) => {
            if i == j {
                return;
            }
            system.add_edge(i, j, w);
            let d = oi - oj;
            system.rhs[i] -= w * d;
            system.rhs[j] += w * d;
        }
        (Endpoint::Movable { idx: i, offset: oi }, Endpoint::Fixed { pos }) => {
            system.diag[i] += w;
            system.rhs[i] += w * (pos - oi);
        }
        (Endpoint::Fixed { pos }, Endpoint::Movable { idx: j, offset: oj }) => {
            system.diag[j] += w;
            system.rhs[j] += w * (pos - oj);
        }
        (Endpoint::Fixed { .. }, Endpoint::Fixed { .. }) => {}
    }
}

/// Builds the axis system from every net's cached extrema
/// (`Net::extrema`, refreshed by the bound tracker before calling this).
/// `eps` is the per-axis epsilon of SPEC_FULL.md OQ-2.
pub fn build_axis_system(
    circuit: &Circuit,
    axis: Axis,
    movable_index: &HashMap<BlockId, usize>,
    eps: f64,
) -> LinearSystem {
    let mut system = LinearSystem::new(movable_index.len());
    for (_, net) in circuit.nets() {
        let Some(extrema) = net.extrema else { continue };
        if net.pins.len() < 2 {
            continue;
        }
        let (i_max, i_min) = match axis {
            Axis::X => (extrema.index_max_x, extrema.index_min_x),
            Axis::Y => (extrema.index_max_y, extrema.index_min_y),
        };
        let extremum_indices = [i_max, i_min];
        let coord = |pr: PinRef| -> f64 {
            match pr {
                PinRef::Block(block, pin) => {
                    let (dx, dy) = {
                        let b = circuit.block(block);
                        let ct = circuit.cell_type(b.cell_type);
                        ct.pin(pin).offset(b.orientation)
                    };
                    let b = circuit.block(block);
                    if axis == Axis::X {
                        b.x + dx
                    } else {
                        b.y + dy
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
        };
        for j in 0..net.pins.len() {
            for k in (j + 1)..net.pins.len() {
                if !extremum_indices.contains(&j) && !extremum_indices.contains(&k) {
                    continue;
                }
                let pj = coord(net.pins[j]);
                let pk = coord(net.pins[k]);
                let w = net.inv_p / (pj - pk).abs().max(eps);
                let a = endpoint(circuit, net.pins[j], axis, movable_index);
                let b = endpoint(circuit, net.pins[k], axis, movable_index);
                apply_pair(&mut system, a, b, w);
            }
        }
    }
    system
}

/// Appends the anchor-pull term (spec.md §4.3 "Anchor extension") for
/// every `(block, anchor_pos)` pair: `w = alpha / max(|p - anchor|, eps)`
/// pulling the block's own coordinate (not a pin) toward its anchor.
pub fn add_anchor_terms(
    system: &mut LinearSystem,
    circuit: &Circuit,
    axis: Axis,
    movable_index: &HashMap<BlockId, usize>,
    anchors: &HashMap<BlockId, (f64, f64)>,
    alpha: f64,
    eps: f64,
) {
    for (&block, &idx) in movable_index {
        let Some(&(ax, ay)) = anchors.get(&block) else { continue };
        let anchor = if axis == Axis::X { ax } else { ay };
        let b = circuit.block(block);
        let current = if axis == Axis::X { b.x } else { b.y };
        let w = alpha / (current - anchor).abs().max(eps);
        if !w.is_finite() || w <= 0.0 {
            continue;
        }
        system.diag[idx] += w;
        system.rhs[idx] += w * anchor;
    }
}
