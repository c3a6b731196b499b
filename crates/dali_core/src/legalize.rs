//! Detailed Legalizer (Tetris), spec.md §4.5.

use dali_common::BlockId;

use crate::circuit::Circuit;
use crate::config::PlacerConfig;
use crate::error::{DaliError, DaliResult};

#[derive(Debug, Clone)]
struct LegalRow {
    lly: f64,
    height: f64,
    next_x: f64,
    region_rx: f64,
    placed: Vec<(f64, f64)>, // (llx, urx) of committed blocks, left to right
}

impl LegalRow {
    fn covers(&self, y: f64, h: f64) -> bool {
        y >= self.lly - 1e-6 && (y + h) <= self.lly + self.height + 1e-6
    }

    /// First x `>= from` at which a block of `width` fits without
    /// overlapping any already-placed block, scanning rightward.
    fn first_fit(&self, from: f64, width: f64) -> Option<f64> {
        let mut x = from.max(self.next_x);
        loop {
            if x + width > self.region_rx + 1e-6 {
                return None;
            }
            let blocked = self
                .placed
                .iter()
                .find(|&&(llx, urx)| x < urx - 1e-9 && llx < x + width - 1e-9);
            match blocked {
                None => return Some(x),
                Some(&(_, urx)) => x = urx,
            }
        }
    }

    fn commit(&mut self, llx: f64, urx: f64) {
        self.placed.push((llx, urx));
        self.placed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        if urx > self.next_x {
            self.next_x = urx;
        }
    }
}

fn build_rows(circuit: &Circuit) -> Vec<LegalRow> {
    let Some(region) = circuit.region() else { return Vec::new() };
    let mut rows: Vec<LegalRow> = circuit
        .rows()
        .iter()
        .map(|r| LegalRow {
            lly: r.lly,
            height: r.height,
            next_x: region.llx,
            region_rx: region.urx(),
            placed: Vec::new(),
        })
        .collect();

    for (id, b) in circuit.blocks() {
        if b.is_movable() {
            continue;
        }
        let rect = circuit.block_rect(id);
        for row in &mut rows {
            if row.lly < rect.ury - 1e-9 && rect.lly < row.lly + row.height - 1e-9 {
                row.placed.push((rect.llx, rect.urx));
            }
        }
    }
    for row in &mut rows {
        row.placed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        row.next_x = row
            .placed
            .iter()
            .filter(|&&(llx, _)| llx < region.llx + 1e-6)
            .map(|&(_, urx)| urx)
            .fold(region.llx, f64::max);
    }
    rows
}

fn nearest_row(rows: &[LegalRow], y: f64, height: f64) -> Option<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, r)| height <= r.height + 1e-6)
        .min_by(|(_, a), (_, b)| {
            (a.lly - y).abs().partial_cmp(&(b.lly - y).abs()).unwrap()
        })
        .map(|(i, _)| i)
}

fn try_place(
    rows: &mut [LegalRow],
    block: BlockId,
    circuit: &Circuit,
) -> Option<(usize, f64, f64)> {
    let rect = circuit.block_rect(block);
    let height = rect.height();
    let row_idx = nearest_row(rows, rect.lly, height)?;
    let region = circuit.region()?;
    let grid_x = circuit.grid_x;
    let llx = if grid_x > 0.0 {
        region.llx + ((rect.llx - region.llx) / grid_x).round() * grid_x
    } else {
        rect.llx
    };
    let x = rows[row_idx].first_fit(llx, rect.width())?;
    Some((row_idx, x, rows[row_idx].lly))
}

fn mirror_x(circuit: &mut Circuit, blocks: &[BlockId]) {
    let Some(region) = circuit.region().copied() else { return };
    let center = (region.llx + region.urx()) / 2.0;
    for &id in blocks {
        let w = circuit.block_width(id);
        let b = circuit.block_mut(id);
        let old_center = b.x + w / 2.0;
        let new_center = 2.0 * center - old_center;
        b.x = new_center - w / 2.0;
    }
}

/// Runs the Tetris detailed legalizer over every movable block in
/// `circuit` (spec.md §4.5). On success, every movable block's `(x, y)`
/// is row- and site-aligned and overlap-free. Bounded by
/// `config.max_flips` fast-shift-and-mirror retries. `on_flip`, if
/// given, is called with `(block_name, flips_so_far)` each time a
/// fast-shift-and-mirror retry is triggered.
pub fn legalize(
    circuit: &mut Circuit,
    config: &PlacerConfig,
    mut on_flip: Option<&mut dyn FnMut(&str, u32)>,
) -> DaliResult<()> {
    let mut movable: Vec<BlockId> = circuit.movable_blocks().collect();
    movable.sort_by(|&a, &b| {
        let ra = circuit.block_rect(a);
        let rb = circuit.block_rect(b);
        ra.llx
            .partial_cmp(&rb.llx)
            .unwrap()
            .then(ra.lly.partial_cmp(&rb.lly).unwrap())
    });

    let mut flips = 0u32;
    loop {
        let mut rows = build_rows(circuit);
        if rows.is_empty() {
            return Ok(());
        }
        let mut failed_at: Option<BlockId> = None;
        let mut placements: Vec<(BlockId, f64, f64)> = Vec::new();

        for &id in &movable {
            match try_place(&mut rows, id, circuit) {
                Some((row_idx, x, y)) => {
                    let w = circuit.block_width(id);
                    rows[row_idx].commit(x, x + w);
                    placements.push((id, x, y));
                }
                None => {
                    failed_at = Some(id);
                    break;
                }
            }
        }

        match failed_at {
            None => {
                for (id, x, y) in placements {
                    let b = circuit.block_mut(id);
                    b.x = x;
                    b.y = y;
                }
                if flips % 2 == 1 {
                    mirror_x(circuit, &movable);
                }
                return Ok(());
            }
            Some(failing) => {
                for (id, x, y) in placements {
                    let b = circuit.block_mut(id);
                    b.x = x;
                    b.y = y;
                }
                if flips >= config.max_flips {
                    return Err(DaliError::Legalization {
                        block: circuit.block(failing).name.clone(),
                        flips,
                    });
                }
                let fail_pos = movable.iter().position(|&id| id == failing).unwrap();
                let Some(region) = circuit.region().copied() else {
                    return Err(DaliError::Legalization {
                        block: circuit.block(failing).name.clone(),
                        flips,
                    });
                };
                for &id in &movable[fail_pos..] {
                    let w = circuit.block_width(id);
                    let b = circuit.block_mut(id);
                    b.x = (b.x + w).min(region.urx() - w);
                }
                mirror_x(circuit, &movable);
                flips += 1;
                if let Some(cb) = on_flip.as_deref_mut() {
                    cb(&circuit.block(failing).name.clone(), flips);
                }
            }
        }
    }
}
