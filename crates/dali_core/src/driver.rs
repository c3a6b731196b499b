//! Global-Placement Driver (spec.md §4.6): the outer pseudo-loop tying
//! the quadratic solver, cell spreader, and detailed legalizer together.

use std::collections::HashMap;

use dali_common::BlockId;
use rand::Rng;

use crate::bound_tracker::total_hpwl_pin_to_pin;
use crate::circuit::Circuit;
use crate::config::PlacerConfig;
use crate::error::DaliResult;
use crate::legalize::legalize;
use crate::solver::b2b::Axis;
use crate::solver::solve_axis;
use crate::spread::spread_pass;

/// Progress events emitted by [`GlobalPlacementDriver::run`] at each
/// iteration boundary (SPEC_FULL.md §0 — replaces a logging dependency
/// the numerical core does not need).
#[derive(Debug, Clone)]
pub enum PlacerEvent {
    /// Random initial placement has been applied to every movable Block.
    RandomInitDone,
    /// One outer iteration finished: the CG solves converged to
    /// `hpwl_lb` and the subsequent spread pass produced `hpwl_ub`.
    OuterIteration {
        /// Outer iteration index, zero-based.
        iter: u32,
        /// Lower-bound HPWL after the per-axis CG solves.
        hpwl_lb: f64,
        /// Upper-bound HPWL after cell-spreading.
        hpwl_ub: f64,
        /// The anchor weight used for this iteration's solve (0 on the
        /// first, anchor-free iteration).
        alpha: f64,
    },
    /// The outer loop converged: `|hpwl_lb - hpwl_ub| / hpwl_lb <= rho`.
    Converged {
        /// Outer iteration at which convergence was detected.
        iter: u32,
    },
    /// The outer iteration cap was reached before convergence.
    BudgetExhausted,
    /// The detailed legalizer performed a fast-shift-and-mirror retry.
    LegalizeFlip {
        /// Name of the block the legalizer could not place.
        block: String,
        /// Number of flips attempted so far, including this one.
        flips: u32,
    },
    /// The detailed legalizer finished successfully.
    LegalizeDone,
}

/// Summary of a completed [`GlobalPlacementDriver::run`] call.
#[derive(Debug, Clone, Copy)]
pub struct DriverReport {
    /// Final HPWL after legalization.
    pub final_hpwl: f64,
    /// Number of outer iterations run.
    pub outer_iterations: u32,
    /// Whether the loop broke on the rho convergence test (`false` means
    /// it broke on the outer iteration cap).
    pub converged: bool,
}

/// Places every movable Block uniformly at random within the region
/// (SPEC_FULL.md OQ-4): x uniform in `[llx, urx - width]`, y drawn from
/// the set of legal row `lly` values so the start is already
/// row-aligned. Seeded from `config.seed` for reproducibility (P6).
pub fn random_init(circuit: &mut Circuit, config: &PlacerConfig) {
    let Some(region) = circuit.region().copied() else { return };
    let row_llys: Vec<f64> = circuit.rows().iter().map(|r| r.lly).collect();
    let mut rng = dali_common::seeded_rng(config.seed);
    let movable: Vec<BlockId> = circuit.movable_blocks().collect();

    for id in movable {
        let w = circuit.block_width(id);
        let h = circuit.block_height(id);

        let x_hi = (region.urx() - w).max(region.llx);
        let x = rng.gen_range(region.llx..=x_hi);

        let y = if row_llys.is_empty() {
            let y_hi = (region.ury() - h).max(region.lly);
            rng.gen_range(region.lly..=y_hi)
        } else {
            let fitting: Vec<f64> = row_llys
                .iter()
                .copied()
                .filter(|&lly| lly + h <= region.ury() + 1e-6)
                .collect();
            let pool = if fitting.is_empty() { &row_llys } else { &fitting };
            pool[rng.gen_range(0..pool.len())]
        };

        let b = circuit.block_mut(id);
        b.x = x;
        b.y = y;
    }
}

fn snapshot_anchors(circuit: &Circuit) -> HashMap<BlockId, (f64, f64)> {
    circuit
        .movable_blocks()
        .map(|id| {
            let b = circuit.block(id);
            (id, (b.x, b.y))
        })
        .collect()
}

/// The anchor weight used for the first, anchor-free outer iteration.
const INITIAL_ALPHA: f64 = 0.01;

/// Orchestrates one full placement run (spec.md §4.6): seeded random
/// init, alternating per-axis CG solves, cell-spreading, anchor-pulled
/// re-solves with monotonically rising `alpha`, and a final hand-off to
/// the detailed legalizer. `events`, if provided, receives one
/// [`PlacerEvent`] per iteration boundary.
pub struct GlobalPlacementDriver;

impl GlobalPlacementDriver {
    /// Runs the full pipeline over `circuit` in place.
    pub fn run(
        circuit: &mut Circuit,
        config: &PlacerConfig,
        mut events: Option<&mut dyn FnMut(PlacerEvent)>,
    ) -> DaliResult<DriverReport> {
        random_init(circuit, config);
        if let Some(cb) = events.as_deref_mut() {
            cb(PlacerEvent::RandomInitDone);
        }

        let mut anchors: Option<HashMap<BlockId, (f64, f64)>> = None;
        let mut alpha = 0.0;
        let mut converged = false;
        let mut last_hpwl = 0.0;
        let mut iter = 0u32;

        for t in 0..config.max_outer_iters {
            iter = t;
            solve_axis(circuit, Axis::X, config, anchors.as_ref(), alpha);
            solve_axis(circuit, Axis::Y, config, anchors.as_ref(), alpha);
            let hpwl_lb = total_hpwl_pin_to_pin(circuit);

            spread_pass(circuit, config);
            let hpwl_ub = total_hpwl_pin_to_pin(circuit);
            last_hpwl = hpwl_ub;

            if let Some(cb) = events.as_deref_mut() {
                cb(PlacerEvent::OuterIteration {
                    iter: t,
                    hpwl_lb,
                    hpwl_ub,
                    alpha,
                });
            }

            let gap_closed = hpwl_lb > 0.0 && (hpwl_lb - hpwl_ub).abs() / hpwl_lb <= config.rho;
            if gap_closed {
                converged = true;
                if let Some(cb) = events.as_deref_mut() {
                    cb(PlacerEvent::Converged { iter: t });
                }
                break;
            }
            if t + 1 >= config.max_outer_iters {
                if let Some(cb) = events.as_deref_mut() {
                    cb(PlacerEvent::BudgetExhausted);
                }
                break;
            }

            anchors = Some(snapshot_anchors(circuit));
            alpha = if alpha == 0.0 { INITIAL_ALPHA } else { alpha * (1.0 + t as f64) };
        }

        {
            let mut on_flip = |block: &str, flips: u32| {
                if let Some(cb) = events.as_deref_mut() {
                    cb(PlacerEvent::LegalizeFlip { block: block.to_string(), flips });
                }
            };
            legalize(circuit, config, Some(&mut on_flip))?;
        }
        if let Some(cb) = events.as_deref_mut() {
            cb(PlacerEvent::LegalizeDone);
        }
        last_hpwl = total_hpwl_pin_to_pin(circuit);

        Ok(DriverReport {
            final_hpwl: last_hpwl,
            outer_iterations: iter,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{PlacementStatus, SignalDirection, SignalUse};
    use crate::row::{PlacementRegion, Row, RowOrientation, RowSegment};
    use dali_common::{Orientation, Rect};

    fn add_inv_type(c: &mut Circuit) -> dali_common::CellTypeId {
        let ct = c.add_block_type("INV", 0.8, 1.6).unwrap();
        let a = c.add_pin_to_type(ct, "A", true).unwrap();
        c.add_pin_rect(ct, a, Rect::new(0.0, 0.6, 0.2, 1.0)).unwrap();
        let y = c.add_pin_to_type(ct, "Y", false).unwrap();
        c.add_pin_rect(ct, y, Rect::new(0.6, 0.6, 0.8, 1.0)).unwrap();
        c.freeze_cell_type(ct).unwrap();
        ct
    }

    fn region_with_rows(c: &mut Circuit, width: f64, height: f64, row_height: f64) {
        c.set_region(PlacementRegion::new(0.0, 0.0, width, height, 0.1, 0.1, row_height).unwrap());
        let mut y = 0.0;
        while y < height - 1e-9 {
            c.add_row(Row {
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
    }

    /// T1: single inverter chain, two INV cells driven through three
    /// nets with two IO pins, in a 10x10 region.
    #[test]
    fn t1_single_inverter_chain() {
        let mut c = Circuit::new(0.1, 0.1);
        region_with_rows(&mut c, 10.0, 10.0, 1.6);
        let ct = add_inv_type(&mut c);
        let a = c.cell_type(ct).pin_id_by_name("A").unwrap();
        let y_pin = c.cell_type(ct).pin_id_by_name("Y").unwrap();

        let inv1 = c.add_block("inv1", ct, 1.0, 0.0, PlacementStatus::Unplaced, Orientation::N).unwrap();
        let inv2 = c.add_block("inv2", ct, 3.0, 0.0, PlacementStatus::Unplaced, Orientation::N).unwrap();
        let p_in = c.add_io_pin("in", SignalDirection::Input, SignalUse::Signal).unwrap();
        let p_out = c.add_io_pin("out", SignalDirection::Output, SignalUse::Signal).unwrap();
        c.io_pin_mut(p_in).x = 0.0;
        c.io_pin_mut(p_in).y = 5.0;
        c.io_pin_mut(p_out).x = 10.0;
        c.io_pin_mut(p_out).y = 5.0;

        let n0 = c.add_net("n0", 2, 1.0).unwrap();
        c.add_io_pin_to_net(n0, p_in).unwrap();
        c.add_blk_pin_to_net(n0, inv1, a).unwrap();
        let n1 = c.add_net("n1", 2, 1.0).unwrap();
        c.add_blk_pin_to_net(n1, inv1, y_pin).unwrap();
        c.add_blk_pin_to_net(n1, inv2, a).unwrap();
        let n2 = c.add_net("n2", 2, 1.0).unwrap();
        c.add_blk_pin_to_net(n2, inv2, y_pin).unwrap();
        c.add_io_pin_to_net(n2, p_out).unwrap();

        let cfg = PlacerConfig { seed: 7, ..PlacerConfig::default() };
        let report = GlobalPlacementDriver::run(&mut c, &cfg, None).unwrap();
        assert!(report.final_hpwl.is_finite());

        let r1 = c.block_rect(inv1);
        let r2 = c.block_rect(inv2);
        let region = c.region().copied().unwrap();
        assert!(region.llx <= r1.llx && r1.urx <= region.urx());
        assert!(region.lly <= r1.lly && r1.ury <= region.ury());
        assert!(region.llx <= r2.llx && r2.urx <= region.urx());
        assert!(!r1.overlaps(&r2));
    }

    /// T2: 4x4 mesh of identical cells with mesh-connecting nets, region
    /// sized for roughly 70% utilization.
    #[test]
    fn t2_four_by_four_mesh() {
        let mut c = Circuit::new(0.1, 0.1);
        let cell_area: f64 = 1.0 * 2.0 * 16.0;
        let region_area: f64 = cell_area / 0.7;
        let row_height: f64 = 2.0;
        let width: f64 = (region_area / (row_height * 4.0)).ceil();
        region_with_rows(&mut c, width, row_height * 4.0, row_height);
        let ct = c.add_block_type("CELL", 1.0, 2.0).unwrap();
        let pin = c.add_pin_to_type(ct, "P", true).unwrap();
        c.add_pin_rect(ct, pin, Rect::new(0.0, 0.8, 0.2, 1.2)).unwrap();
        c.freeze_cell_type(ct).unwrap();

        let mut ids = Vec::new();
        for i in 0..16 {
            let id = c
                .add_block(&format!("c{i}"), ct, 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
                .unwrap();
            ids.push(id);
        }
        // 2-D mesh: connect each cell to its right and up neighbor (24 nets in a 4x4 grid).
        let mut net_idx = 0;
        for row in 0..4 {
            for col in 0..4 {
                let here = ids[row * 4 + col];
                if col + 1 < 4 {
                    let right = ids[row * 4 + col + 1];
                    let n = c.add_net(&format!("nx{net_idx}"), 2, 1.0).unwrap();
                    net_idx += 1;
                    c.add_blk_pin_to_net(n, here, pin).unwrap();
                    c.add_blk_pin_to_net(n, right, pin).unwrap();
                }
                if row + 1 < 4 {
                    let up = ids[(row + 1) * 4 + col];
                    let n = c.add_net(&format!("ny{net_idx}"), 2, 1.0).unwrap();
                    net_idx += 1;
                    c.add_blk_pin_to_net(n, here, pin).unwrap();
                    c.add_blk_pin_to_net(n, up, pin).unwrap();
                }
            }
        }

        let cfg = PlacerConfig { seed: 3, ..PlacerConfig::default() };
        GlobalPlacementDriver::run(&mut c, &cfg, None).unwrap();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                assert!(!c.block_rect(ids[i]).overlaps(&c.block_rect(ids[j])));
            }
        }
    }

    /// T3: anchor-pull convergence between two cells connected by one net.
    #[test]
    fn t3_anchor_pull_convergence() {
        let mut c = Circuit::new(0.1, 0.1);
        region_with_rows(&mut c, 20.0, 20.0, 2.0);
        let ct = c.add_block_type("CELL", 1.0, 2.0).unwrap();
        let p = c.add_pin_to_type(ct, "P", true).unwrap();
        c.add_pin_rect(ct, p, Rect::new(0.0, 0.8, 0.2, 1.2)).unwrap();
        c.freeze_cell_type(ct).unwrap();

        let b1 = c.add_block("b1", ct, 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N).unwrap();
        let b2 = c.add_block("b2", ct, 10.0, 10.0, PlacementStatus::Unplaced, Orientation::N).unwrap();
        let n = c.add_net("n0", 2, 1.0).unwrap();
        c.add_blk_pin_to_net(n, b1, p).unwrap();
        c.add_blk_pin_to_net(n, b2, p).unwrap();

        let cfg = PlacerConfig { seed: 1, max_outer_iters: 6, ..PlacerConfig::default() };
        let report = GlobalPlacementDriver::run(&mut c, &cfg, None).unwrap();
        assert!(report.final_hpwl.is_finite());
    }

    /// T4: obstacle avoidance, central fixed macro.
    #[test]
    fn t4_obstacle_avoidance() {
        let mut c = Circuit::new(0.1, 0.1);
        region_with_rows(&mut c, 16.0, 16.0, 2.0);
        let ct = c.add_block_type("CELL", 1.0, 2.0).unwrap();
        let p = c.add_pin_to_type(ct, "P", true).unwrap();
        c.add_pin_rect(ct, p, Rect::new(0.0, 0.8, 0.2, 1.2)).unwrap();
        c.freeze_cell_type(ct).unwrap();

        let macro_ct = c.add_block_type("MACRO", 4.0, 4.0).unwrap();
        c.freeze_cell_type(macro_ct).unwrap();
        let fixed = c
            .add_block("obstacle", macro_ct, 6.0, 6.0, PlacementStatus::Fixed, Orientation::N)
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..8 {
            let id = c
                .add_block(&format!("c{i}"), ct, 1.0 + i as f64, 0.0, PlacementStatus::Unplaced, Orientation::N)
                .unwrap();
            ids.push(id);
        }
        let n = c.add_net("n0", 8, 1.0).unwrap();
        for &id in &ids {
            c.add_blk_pin_to_net(n, id, p).unwrap();
        }

        let cfg = PlacerConfig { seed: 5, ..PlacerConfig::default() };
        GlobalPlacementDriver::run(&mut c, &cfg, None).unwrap();

        let obstacle_rect = c.block_rect(fixed);
        for &id in &ids {
            assert!(!c.block_rect(id).overlaps(&obstacle_rect));
        }
    }

    /// T5: Tetris flip recovery. A fixed obstacle splits a single row
    /// into two segments exactly sized for two movable cells; both
    /// cells' initial advisory positions spill into the obstacle,
    /// wasting the left segment and leaving the last cell in sort
    /// order with no room. The legalizer must flip (shift-and-mirror),
    /// succeed on retry, and mirror back since one flip is odd.
    #[test]
    fn t5_tetris_flip_recovery() {
        let mut c = Circuit::new(1.0, 1.0);
        c.set_region(PlacementRegion::new(0.0, 0.0, 10.0, 2.0, 1.0, 1.0, 2.0).unwrap());
        c.add_row(Row {
            lly: 0.0,
            height: 2.0,
            orientation: RowOrientation::N,
            p_well_height: 0.0,
            n_well_height: 0.0,
            segments: vec![RowSegment { llx: 0.0, width: 10.0, blocks: Vec::new() }],
        })
        .unwrap();

        let ct = c.add_block_type("CELL4", 4.0, 2.0).unwrap();
        let pin = c.add_pin_to_type(ct, "P", true).unwrap();
        c.add_pin_rect(ct, pin, Rect::new(0.0, 0.8, 0.2, 1.2)).unwrap();
        c.freeze_cell_type(ct).unwrap();
        let obstacle_ct = c.add_block_type("OBSTACLE2", 2.0, 2.0).unwrap();
        c.freeze_cell_type(obstacle_ct).unwrap();

        c.add_block("obstacle", obstacle_ct, 4.0, 0.0, PlacementStatus::Fixed, Orientation::N).unwrap();
        let u0 = c.add_block("u0", ct, 1.0, 0.0, PlacementStatus::Unplaced, Orientation::N).unwrap();
        let u1 = c.add_block("u1", ct, 5.0, 0.0, PlacementStatus::Unplaced, Orientation::N).unwrap();

        let cfg = PlacerConfig { max_flips: 1, ..PlacerConfig::default() };
        let mut flip_count = 0u32;
        let mut on_flip = |_block: &str, flips: u32| flip_count = flips;
        legalize(&mut c, &cfg, Some(&mut on_flip)).unwrap();

        assert_eq!(flip_count, 1);
        assert!(!c.block_rect(u0).overlaps(&c.block_rect(u1)));
        assert!((c.block(u0).x - 6.0).abs() < 1e-9);
        assert!((c.block(u1).x - 0.0).abs() < 1e-9);
    }

    /// T6: pin-offset orientation round-trip under FS, by hand per
    /// spec.md's worked example.
    #[test]
    fn t6_pin_offset_orientation() {
        let mut c = Circuit::new(0.1, 0.1);
        let ct = c.add_block_type("CELL", 0.8, 1.6).unwrap();
        let p = c.add_pin_to_type(ct, "P", true).unwrap();
        c.add_pin_rect(ct, p, Rect::new(0.1, 1.5, 0.3, 1.6)).unwrap();
        c.freeze_cell_type(ct).unwrap();
        let b = c.add_block("u0", ct, 10.0, 20.0, PlacementStatus::Placed, Orientation::FS).unwrap();
        let (x, y) = c.pin_position(b, p);
        assert!((x - 10.1).abs() < 1e-9);
        assert!((y - 20.1).abs() < 1e-9);
    }

    /// P6: determinism under identical seed.
    #[test]
    fn p6_determinism() {
        fn build() -> Circuit {
            let mut c = Circuit::new(0.1, 0.1);
            region_with_rows(&mut c, 20.0, 8.0, 2.0);
            let ct = c.add_block_type("CELL", 1.0, 2.0).unwrap();
            let p = c.add_pin_to_type(ct, "P", true).unwrap();
            c.add_pin_rect(ct, p, Rect::new(0.0, 0.8, 0.2, 1.2)).unwrap();
            c.freeze_cell_type(ct).unwrap();
            let mut ids = Vec::new();
            for i in 0..6 {
                ids.push(c.add_block(&format!("c{i}"), ct, 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N).unwrap());
            }
            for w in ids.windows(2) {
                let n = c.add_net("n", 2, 1.0).unwrap();
                c.add_blk_pin_to_net(n, w[0], p).unwrap();
                c.add_blk_pin_to_net(n, w[1], p).unwrap();
            }
            c
        }

        let cfg = PlacerConfig { seed: 99, ..PlacerConfig::default() };
        let mut a = build();
        let mut b = build();
        GlobalPlacementDriver::run(&mut a, &cfg, None).unwrap();
        GlobalPlacementDriver::run(&mut b, &cfg, None).unwrap();

        for (id_a, id_b) in a.blocks().map(|(id, _)| id).zip(b.blocks().map(|(id, _)| id)) {
            assert_eq!(a.block(id_a).x, b.block(id_b).x);
            assert_eq!(a.block(id_a).y, b.block(id_b).y);
        }
    }

    #[test]
    fn random_init_is_row_aligned_and_in_region() {
        let mut c = Circuit::new(0.1, 0.1);
        region_with_rows(&mut c, 12.0, 6.0, 2.0);
        let ct = c.add_block_type("CELL", 1.0, 2.0).unwrap();
        c.freeze_cell_type(ct).unwrap();
        let id = c.add_block("u0", ct, 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N).unwrap();
        let cfg = PlacerConfig { seed: 11, ..PlacerConfig::default() };
        random_init(&mut c, &cfg);
        let b = c.block(id);
        assert!([0.0, 2.0, 4.0].contains(&b.y));
        assert!(b.x >= 0.0 && b.x <= 11.0);
    }
}
