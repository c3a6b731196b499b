//! Net Bound-Tracker (spec.md §4.2): pure functions computing per-net
//! extrema and HPWL from the current `Circuit` state. Never mutates a
//! `Block`; only caches indices inside a `Net` via
//! [`update_net_extrema_cache`].

use dali_common::NetId;

use crate::circuit::Circuit;
use crate::design::{NetExtrema, PinRef};

/// Which coordinate a net's pins are measured at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordMode {
    /// Oriented absolute pin coordinates (spec.md "pin-to-pin").
    PinToPin,
    /// Block/IoPin centers only, ignoring pin offsets (spec.md
    /// "center-to-center").
    CenterToCenter,
}

fn pin_coord(circuit: &Circuit, pin_ref: PinRef, mode: CoordMode) -> (f64, f64) {
    match pin_ref {
        PinRef::Block(block, pin) => match mode {
            CoordMode::PinToPin => circuit.pin_position(block, pin),
            CoordMode::CenterToCenter => circuit.block_rect(block).center(),
        },
        PinRef::Io(io) => {
            let p = circuit.io_pin(io);
            (p.x, p.y)
        }
    }
}

/// Computes the extrema of `net`'s pins under `mode`. Ties are broken by
/// keeping the first-seen (lowest-index) pin: pins are scanned in
/// ascending index order and the running extremum is only replaced by a
/// strictly greater (for max) or strictly lesser (for min) value
/// (SPEC_FULL.md OQ-1).
pub fn compute_extrema(circuit: &Circuit, net: NetId, mode: CoordMode) -> Option<NetExtrema> {
    let n = circuit.net(net);
    if n.pins.is_empty() {
        return None;
    }
    let coords: Vec<(f64, f64)> = n
        .pins
        .iter()
        .map(|p| pin_coord(circuit, *p, mode))
        .collect();

    let mut index_max_x = 0;
    let mut index_min_x = 0;
    let mut index_max_y = 0;
    let mut index_min_y = 0;
    for (i, (x, y)) in coords.iter().enumerate().skip(1) {
        if *x > coords[index_max_x].0 {
            index_max_x = i;
        }
        if *x < coords[index_min_x].0 {
            index_min_x = i;
        }
        if *y > coords[index_max_y].1 {
            index_max_y = i;
        }
        if *y < coords[index_min_y].1 {
            index_min_y = i;
        }
    }
    Some(NetExtrema {
        index_max_x,
        index_min_x,
        index_max_y,
        index_min_y,
    })
}

/// Recomputes `net`'s cached extrema (pin-to-pin form, the one the solver
/// consumes) and stores it on the `Net`.
pub fn update_net_extrema_cache(circuit: &mut Circuit, net: NetId) {
    let extrema = compute_extrema(circuit, net, CoordMode::PinToPin);
    circuit.net_mut(net).extrema = extrema;
}

/// The half-perimeter wirelength of `net` under `mode`, weighted by its
/// `weight`. Zero for nets with fewer than 2 pins (spec.md §4.2).
fn hpwl(circuit: &Circuit, net: NetId, mode: CoordMode) -> f64 {
    let n = circuit.net(net);
    if n.pins.len() < 2 {
        return 0.0;
    }
    let Some(extrema) = compute_extrema(circuit, net, mode) else {
        return 0.0;
    };
    let coords: Vec<(f64, f64)> = n
        .pins
        .iter()
        .map(|p| pin_coord(circuit, *p, mode))
        .collect();
    let dx = coords[extrema.index_max_x].0 - coords[extrema.index_min_x].0;
    let dy = coords[extrema.index_max_y].1 - coords[extrema.index_min_y].1;
    n.weight * (dx + dy)
}

/// Pin-to-pin HPWL of `net` (spec.md §4.2).
pub fn hpwl_pin_to_pin(circuit: &Circuit, net: NetId) -> f64 {
    hpwl(circuit, net, CoordMode::PinToPin)
}

/// Center-to-center HPWL of `net` (spec.md §4.2).
pub fn hpwl_center_to_center(circuit: &Circuit, net: NetId) -> f64 {
    hpwl(circuit, net, CoordMode::CenterToCenter)
}

/// Sum of [`hpwl_pin_to_pin`] over every net in the circuit.
pub fn total_hpwl_pin_to_pin(circuit: &Circuit) -> f64 {
    circuit
        .nets()
        .map(|(id, _)| hpwl_pin_to_pin(circuit, id))
        .sum()
}
