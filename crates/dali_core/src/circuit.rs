//! `Circuit`: the single root object passed between pipeline components
//! (spec.md §3/§4.1). Owns a `Tech`, a `Design`, and the row/region model,
//! and is the sole surface through which callers build a circuit.

use dali_common::{BlockId, CellTypeId, IoPinId, NetId, Orientation, PinTemplateId, Rect};
use serde::{Deserialize, Serialize};

use crate::design::{Design, IoPin, Net, PlacementStatus, SignalDirection, SignalUse};
use crate::error::DaliResult;
use crate::row::{PlacementRegion, Row};
use crate::tech::{CellType, Tech};
use crate::design::Block;

/// The circuit graph: technology library, design instances, and the row
/// model, all under one root (spec.md §3 "Ownership").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    tech: Tech,
    design: Design,
    /// Horizontal placement grid step.
    pub grid_x: f64,
    /// Vertical placement grid step.
    pub grid_y: f64,
    region: Option<PlacementRegion>,
    rows: Vec<Row>,
}

impl Circuit {
    /// Creates an empty circuit with the given placement grid steps.
    pub fn new(grid_x: f64, grid_y: f64) -> Self {
        Self {
            tech: Tech::new(),
            design: Design::new(),
            grid_x,
            grid_y,
            region: None,
            rows: Vec::new(),
        }
    }

    // -- Tech delegation (spec.md §4.1) -----------------------------------

    /// See [`Tech::add_block_type`].
    pub fn add_block_type(
        &mut self,
        name: &str,
        width: f64,
        height: f64,
    ) -> DaliResult<CellTypeId> {
        self.tech
            .add_block_type(name, width, height, self.grid_x, self.grid_y)
    }

    /// See [`Tech::add_pin_to_type`].
    pub fn add_pin_to_type(
        &mut self,
        cell_type: CellTypeId,
        pin_name: &str,
        is_input: bool,
    ) -> DaliResult<PinTemplateId> {
        self.tech.add_pin_to_type(cell_type, pin_name, is_input)
    }

    /// See [`Tech::add_pin_rect`].
    pub fn add_pin_rect(
        &mut self,
        cell_type: CellTypeId,
        pin: PinTemplateId,
        rect: Rect,
    ) -> DaliResult<()> {
        self.tech.add_pin_rect(cell_type, pin, rect)
    }

    /// See [`Tech::freeze_cell_type`].
    pub fn freeze_cell_type(&mut self, cell_type: CellTypeId) -> DaliResult<()> {
        self.tech.freeze_cell_type(cell_type)
    }

    /// Looks up a cell type.
    pub fn cell_type(&self, id: CellTypeId) -> &CellType {
        self.tech.cell_type(id)
    }

    /// Looks up a cell type's ID by name.
    pub fn cell_type_id_by_name(&self, name: &str) -> Option<CellTypeId> {
        self.tech.cell_type_id_by_name(name)
    }

    /// Effective width of `block`, i.e. its cell type's width transformed
    /// by its orientation.
    pub fn block_width(&self, block: BlockId) -> f64 {
        let b = self.design.block(block);
        let ct = self.tech.cell_type(b.cell_type);
        let (w, _) = b.orientation.transformed_dims(ct.width, ct.height);
        w
    }

    /// Effective height of `block`: the `effective_height` override if
    /// present, else its cell type's height transformed by orientation.
    pub fn block_height(&self, block: BlockId) -> f64 {
        let b = self.design.block(block);
        if let Some(h) = b.effective_height {
            return h;
        }
        let ct = self.tech.cell_type(b.cell_type);
        let (_, h) = b.orientation.transformed_dims(ct.width, ct.height);
        h
    }

    /// The world-space rectangle occupied by `block`.
    pub fn block_rect(&self, block: BlockId) -> Rect {
        let b = self.design.block(block);
        let w = self.block_width(block);
        let h = self.block_height(block);
        Rect::new(b.x, b.y, b.x + w, b.y + h)
    }

    /// The absolute position of `(block, pin)`, applying the pin's
    /// per-orientation offset (invariant I4).
    pub fn pin_position(&self, block: BlockId, pin: PinTemplateId) -> (f64, f64) {
        let b = self.design.block(block);
        let ct = self.tech.cell_type(b.cell_type);
        let (dx, dy) = ct.pin(pin).offset(b.orientation);
        (b.x + dx, b.y + dy)
    }

    // -- Design delegation (spec.md §4.1) ---------------------------------

    /// See [`Design::add_block`].
    pub fn add_block(
        &mut self,
        name: &str,
        cell_type: CellTypeId,
        x: f64,
        y: f64,
        status: PlacementStatus,
        orientation: Orientation,
    ) -> DaliResult<BlockId> {
        self.design
            .add_block(name, cell_type, x, y, status, orientation)
    }

    /// See [`Design::add_io_pin`].
    pub fn add_io_pin(
        &mut self,
        name: &str,
        direction: SignalDirection,
        signal_use: SignalUse,
    ) -> DaliResult<IoPinId> {
        self.design.add_io_pin(name, direction, signal_use)
    }

    /// See [`Design::add_net`].
    pub fn add_net(&mut self, name: &str, capacity: usize, weight: f64) -> DaliResult<NetId> {
        self.design.add_net(name, capacity, weight)
    }

    /// See [`Design::add_blk_pin_to_net`].
    pub fn add_blk_pin_to_net(
        &mut self,
        net: NetId,
        block: BlockId,
        pin: PinTemplateId,
    ) -> DaliResult<()> {
        self.design.add_blk_pin_to_net(net, block, pin)
    }

    /// See [`Design::add_io_pin_to_net`].
    pub fn add_io_pin_to_net(&mut self, net: NetId, io_pin: IoPinId) -> DaliResult<()> {
        self.design.add_io_pin_to_net(net, io_pin)
    }

    /// Looks up a block.
    pub fn block(&self, id: BlockId) -> &Block {
        self.design.block(id)
    }

    /// Looks up a block mutably.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        self.design.block_mut(id)
    }

    /// Looks up a block's ID by name.
    pub fn block_id_by_name(&self, name: &str) -> Option<BlockId> {
        self.design.block_id_by_name(name)
    }

    /// Iterates over `(id, block)` pairs.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.design.blocks()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.design.block_count()
    }

    /// Iterates over movable block IDs.
    pub fn movable_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.design
            .blocks()
            .filter(|(_, b)| b.is_movable())
            .map(|(id, _)| id)
    }

    /// Looks up an IO pin.
    pub fn io_pin(&self, id: IoPinId) -> &IoPin {
        self.design.io_pin(id)
    }

    /// Looks up an IO pin mutably.
    pub fn io_pin_mut(&mut self, id: IoPinId) -> &mut IoPin {
        self.design.io_pin_mut(id)
    }

    /// Iterates over `(id, io_pin)` pairs.
    pub fn io_pins(&self) -> impl Iterator<Item = (IoPinId, &IoPin)> {
        self.design.io_pins()
    }

    /// Looks up a net.
    pub fn net(&self, id: NetId) -> &Net {
        self.design.net(id)
    }

    /// Looks up a net mutably.
    pub fn net_mut(&mut self, id: NetId) -> &mut Net {
        self.design.net_mut(id)
    }

    /// Iterates over `(id, net)` pairs.
    pub fn nets(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.design.nets()
    }

    /// Number of nets.
    pub fn net_count(&self) -> usize {
        self.design.net_count()
    }

    // -- Region / row model ------------------------------------------------

    /// Sets the placement region (spec.md §3 PlacementRegion).
    pub fn set_region(&mut self, region: PlacementRegion) {
        self.region = Some(region);
    }

    /// The placement region, if set.
    pub fn region(&self) -> Option<&PlacementRegion> {
        self.region.as_ref()
    }

    /// Appends a row, checking it fits within the region when one is set.
    pub fn add_row(&mut self, row: Row) -> DaliResult<()> {
        if let Some(region) = &self.region {
            if !region.contains_row(&row) {
                return Err(crate::error::DaliError::Geometry {
                    cell_type: "<row>".into(),
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// The row model.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The row model, mutably.
    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    /// The row whose `[lly, lly+height)` band contains `y`, if any.
    pub fn row_at_y(&self, y: f64) -> Option<&Row> {
        self.rows
            .iter()
            .find(|r| y >= r.lly - 1e-9 && y < r.ury() + 1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{RowOrientation, RowSegment};

    fn small_circuit() -> (Circuit, CellTypeId) {
        let mut c = Circuit::new(0.1, 0.1);
        let ct = c.add_block_type("INV_X1", 0.8, 1.6).unwrap();
        let p_in = c.add_pin_to_type(ct, "A", true).unwrap();
        c.add_pin_rect(ct, p_in, Rect::new(0.0, 0.6, 0.2, 1.0)).unwrap();
        let p_out = c.add_pin_to_type(ct, "Y", false).unwrap();
        c.add_pin_rect(ct, p_out, Rect::new(0.6, 0.6, 0.8, 1.0)).unwrap();
        c.freeze_cell_type(ct).unwrap();
        (c, ct)
    }

    #[test]
    fn build_and_connect() {
        let (mut c, ct) = small_circuit();
        let b1 = c
            .add_block("u1", ct, 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let b2 = c
            .add_block("u2", ct, 2.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let n = c.add_net("n0", 2, 1.0).unwrap();
        let p_out = c.cell_type(ct).pin_id_by_name("Y").unwrap();
        let p_in = c.cell_type(ct).pin_id_by_name("A").unwrap();
        c.add_blk_pin_to_net(n, b1, p_out).unwrap();
        c.add_blk_pin_to_net(n, b2, p_in).unwrap();
        assert_eq!(c.net(n).pins.len(), 2);
        assert_eq!(c.block_width(b1), 0.8);
        assert_eq!(c.block_height(b1), 1.6);
    }

    #[test]
    fn pin_position_applies_offset() {
        let (mut c, ct) = small_circuit();
        let b1 = c
            .add_block("u1", ct, 10.0, 20.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let p_in = c.cell_type(ct).pin_id_by_name("A").unwrap();
        let (x, y) = c.pin_position(b1, p_in);
        assert!((x - 10.1).abs() < 1e-9);
        assert!((y - 20.8).abs() < 1e-9);
    }

    #[test]
    fn row_outside_region_rejected() {
        let mut c = Circuit::new(0.1, 0.1);
        c.set_region(PlacementRegion::new(0.0, 0.0, 100.0, 8.0, 0.1, 0.1, 8.0).unwrap());
        let bad_row = Row {
            lly: 4.0,
            height: 8.0,
            orientation: RowOrientation::N,
            p_well_height: 2.0,
            n_well_height: 2.0,
            segments: vec![RowSegment { llx: 0.0, width: 100.0, blocks: Vec::new() }],
        };
        assert!(c.add_row(bad_row).is_err());
    }

    #[test]
    fn row_at_y_lookup() {
        let mut c = Circuit::new(0.1, 0.1);
        c.set_region(PlacementRegion::new(0.0, 0.0, 100.0, 16.0, 0.1, 0.1, 8.0).unwrap());
        c.add_row(Row {
            lly: 0.0,
            height: 8.0,
            orientation: RowOrientation::N,
            p_well_height: 2.0,
            n_well_height: 2.0,
            segments: vec![],
        })
        .unwrap();
        c.add_row(Row {
            lly: 8.0,
            height: 8.0,
            orientation: RowOrientation::FS,
            p_well_height: 2.0,
            n_well_height: 2.0,
            segments: vec![],
        })
        .unwrap();
        assert_eq!(c.row_at_y(9.0).unwrap().orientation, RowOrientation::FS);
    }

    #[test]
    fn serde_roundtrip() {
        let (c, _) = small_circuit();
        let json = serde_json::to_string(&c).unwrap();
        let restored: Circuit = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.block_count(), 0);
    }
}
