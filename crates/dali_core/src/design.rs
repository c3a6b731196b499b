//! Design aggregate: blocks, IO pins, and nets (spec.md §3 Block/IoPin/Net).
//!
//! `Design` owns everything that is mutated during placement. It enforces
//! the "Blocks/IoPins before Nets" ordering invariant (spec.md §4.1): once a
//! `Net` exists, its cached pin-list indices into `blocks`/`io_pins` must
//! stay valid, so no more blocks or IO pins may be admitted.

use std::collections::HashMap;

use dali_common::{BlockId, CellTypeId, IoPinId, NetId, Orientation, PinTemplateId};
use serde::{Deserialize, Serialize};

use crate::error::{DaliError, DaliResult};

/// Placement status of a `Block` or `IoPin` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementStatus {
    /// A blockage or cover shape; immovable, not part of routing/placement
    /// optimization.
    Cover,
    /// Fixed in place (e.g. a macro or pre-placed IO); immovable.
    Fixed,
    /// Placed, but movable by the placer.
    Placed,
    /// Not yet placed; movable.
    Unplaced,
}

impl PlacementStatus {
    /// Whether an entity with this status may be moved by the placer.
    pub fn is_movable(self) -> bool {
        matches!(self, PlacementStatus::Placed | PlacementStatus::Unplaced)
    }
}

/// Signal direction of an `IoPin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    /// A primary input.
    Input,
    /// A primary output.
    Output,
    /// A bidirectional pin.
    InOut,
}

/// Signal use of an `IoPin` (role within the design, distinct from
/// direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalUse {
    /// An ordinary signal net.
    Signal,
    /// A clock net.
    Clock,
    /// A power rail.
    Power,
    /// A ground rail.
    Ground,
    /// An analog signal.
    Analog,
}

/// A cell instance (spec.md §3 Block).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Name, unique within the design.
    pub name: String,
    /// The owning cell type.
    pub cell_type: CellTypeId,
    /// Lower-left x (may be fractional during the analytical phase).
    pub x: f64,
    /// Lower-left y.
    pub y: f64,
    /// Orientation.
    pub orientation: Orientation,
    /// Placement status.
    pub status: PlacementStatus,
    /// An effective height overriding the cell type's height, if present.
    pub effective_height: Option<f64>,
    /// Indices of nets incident on this block (invariant I1).
    pub nets: Vec<NetId>,
}

impl Block {
    /// Whether this block may be moved by the placer.
    pub fn is_movable(&self) -> bool {
        self.status.is_movable()
    }
}

/// A primary input/output port (spec.md §3 IoPin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoPin {
    /// Name, unique within the design.
    pub name: String,
    /// The net this pin belongs to, if connected.
    pub net: Option<NetId>,
    /// Signal direction.
    pub direction: SignalDirection,
    /// Signal use/role.
    pub signal_use: SignalUse,
    /// Optional metal-layer binding.
    pub layer: Option<String>,
    /// Lower-left x (IO pins are zero-area points).
    pub x: f64,
    /// Lower-left y.
    pub y: f64,
    /// Placement status.
    pub status: PlacementStatus,
}

impl IoPin {
    /// Whether this IO pin may be moved by the placer.
    pub fn is_movable(&self) -> bool {
        self.status.is_movable()
    }
}

/// A reference to one pin incident on a net: either a `(Block,
/// PinTemplate)` pair or an `IoPin` (spec.md §9 design note: replaces the
/// source's dummy "IO dummy" `CellType` workaround with a sum type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinRef {
    /// A pin on a block instance.
    Block(BlockId, PinTemplateId),
    /// An IO pin.
    Io(IoPinId),
}

/// Cached per-net extrema, filled in on demand by the bound tracker
/// (spec.md §4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetExtrema {
    /// Index (into `Net::pins`) of the pin with maximum absolute x.
    pub index_max_x: usize,
    /// Index of the pin with minimum absolute x.
    pub index_min_x: usize,
    /// Index of the pin with maximum absolute y.
    pub index_max_y: usize,
    /// Index of the pin with minimum absolute y.
    pub index_min_y: usize,
}

/// A hyper-edge connecting a set of pins (spec.md §3 Net).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// Name, unique within the design.
    pub name: String,
    /// Net weight.
    pub weight: f64,
    /// Firm upper bound on the number of pins (spec.md §4.1 `add_net`).
    pub capacity: usize,
    /// The pins incident on this net, in insertion order.
    pub pins: Vec<PinRef>,
    /// `weight / (P - 1)` for `P >= 2` pins, else `0` (invariant I2).
    pub inv_p: f64,
    /// Cached extrema, re-derived by the bound tracker on demand.
    pub extrema: Option<NetExtrema>,
}

impl Net {
    fn recompute_inv_p(&mut self) {
        let p = self.pins.len();
        self.inv_p = if p >= 2 {
            self.weight / (p as f64 - 1.0)
        } else {
            0.0
        };
    }
}

/// The mutable design aggregate: blocks, IO pins, and nets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Design {
    blocks: Vec<Block>,
    block_by_name: HashMap<String, BlockId>,
    io_pins: Vec<IoPin>,
    io_pin_by_name: HashMap<String, IoPinId>,
    nets: Vec<Net>,
    net_by_name: HashMap<String, NetId>,
    /// Set once the first net is created; blocks/IO pins may no longer be
    /// added once this is `true` (spec.md §4.1 ordering invariant).
    nets_started: bool,
}

impl Design {
    /// Creates an empty design.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block instance (spec.md §4.1 `add_block`).
    #[allow(clippy::too_many_arguments)]
    pub fn add_block(
        &mut self,
        name: &str,
        cell_type: CellTypeId,
        x: f64,
        y: f64,
        status: PlacementStatus,
        orientation: Orientation,
    ) -> DaliResult<BlockId> {
        if self.nets_started {
            return Err(DaliError::Ordering {
                what: "block".into(),
                name: name.to_string(),
            });
        }
        if self.block_by_name.contains_key(name) {
            return Err(DaliError::NameCollision {
                name: name.to_string(),
                category: "blocks".into(),
            });
        }
        let id = BlockId::from_raw(self.blocks.len() as u32);
        self.blocks.push(Block {
            name: name.to_string(),
            cell_type,
            x,
            y,
            orientation,
            status,
            effective_height: None,
            nets: Vec::new(),
        });
        self.block_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Adds an IO pin.
    pub fn add_io_pin(
        &mut self,
        name: &str,
        direction: SignalDirection,
        signal_use: SignalUse,
    ) -> DaliResult<IoPinId> {
        if self.nets_started {
            return Err(DaliError::Ordering {
                what: "io pin".into(),
                name: name.to_string(),
            });
        }
        if self.io_pin_by_name.contains_key(name) {
            return Err(DaliError::NameCollision {
                name: name.to_string(),
                category: "io pins".into(),
            });
        }
        let id = IoPinId::from_raw(self.io_pins.len() as u32);
        self.io_pins.push(IoPin {
            name: name.to_string(),
            net: None,
            direction,
            signal_use,
            layer: None,
            x: 0.0,
            y: 0.0,
            status: PlacementStatus::Unplaced,
        });
        self.io_pin_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Adds a net with a firm pin-count `capacity` (spec.md §4.1 `add_net`).
    /// Its pins vector is pre-reserved to `capacity` (spec.md §5 memory
    /// note).
    pub fn add_net(&mut self, name: &str, capacity: usize, weight: f64) -> DaliResult<NetId> {
        if self.net_by_name.contains_key(name) {
            return Err(DaliError::NameCollision {
                name: name.to_string(),
                category: "nets".into(),
            });
        }
        self.nets_started = true;
        let id = NetId::from_raw(self.nets.len() as u32);
        let mut pins = Vec::new();
        pins.reserve_exact(capacity);
        self.nets.push(Net {
            name: name.to_string(),
            weight,
            capacity,
            pins,
            inv_p: 0.0,
            extrema: None,
        });
        self.net_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Connects a block's pin to a net (spec.md §4.1 `add_blk_pin_to_net`).
    pub fn add_blk_pin_to_net(
        &mut self,
        net: NetId,
        block: BlockId,
        pin: PinTemplateId,
    ) -> DaliResult<()> {
        self.blocks
            .get(block.index())
            .ok_or_else(|| DaliError::MissingReference {
                what: "block".into(),
                name: format!("#{}", block.as_raw()),
            })?;
        self.push_pin_ref(net, PinRef::Block(block, pin))?;
        self.blocks[block.index()].nets.push(net);
        Ok(())
    }

    /// Connects an IO pin to a net (spec.md §4.1 `add_io_pin_to_net`).
    pub fn add_io_pin_to_net(&mut self, net: NetId, io_pin: IoPinId) -> DaliResult<()> {
        self.io_pins
            .get(io_pin.index())
            .ok_or_else(|| DaliError::MissingReference {
                what: "io pin".into(),
                name: format!("#{}", io_pin.as_raw()),
            })?;
        self.push_pin_ref(net, PinRef::Io(io_pin))?;
        self.io_pins[io_pin.index()].net = Some(net);
        Ok(())
    }

    fn push_pin_ref(&mut self, net: NetId, pin_ref: PinRef) -> DaliResult<()> {
        let n = self
            .nets
            .get_mut(net.index())
            .ok_or_else(|| DaliError::MissingReference {
                what: "net".into(),
                name: format!("#{}", net.as_raw()),
            })?;
        if n.pins.len() >= n.capacity {
            return Err(DaliError::Capacity {
                net: n.name.clone(),
                capacity: n.capacity,
                attempted: n.pins.len() + 1,
            });
        }
        n.pins.push(pin_ref);
        n.recompute_inv_p();
        Ok(())
    }

    /// Looks up a block by ID.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Looks up a block mutably by ID.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Looks up a block's ID by name.
    pub fn block_id_by_name(&self, name: &str) -> Option<BlockId> {
        self.block_by_name.get(name).copied()
    }

    /// Iterates over `(id, block)` pairs.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId::from_raw(i as u32), b))
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Looks up an IO pin by ID.
    pub fn io_pin(&self, id: IoPinId) -> &IoPin {
        &self.io_pins[id.index()]
    }

    /// Looks up an IO pin mutably by ID.
    pub fn io_pin_mut(&mut self, id: IoPinId) -> &mut IoPin {
        &mut self.io_pins[id.index()]
    }

    /// Iterates over `(id, io_pin)` pairs.
    pub fn io_pins(&self) -> impl Iterator<Item = (IoPinId, &IoPin)> {
        self.io_pins
            .iter()
            .enumerate()
            .map(|(i, p)| (IoPinId::from_raw(i as u32), p))
    }

    /// Looks up a net by ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    /// Looks up a net mutably by ID.
    pub fn net_mut(&mut self, id: NetId) -> &mut Net {
        &mut self.nets[id.index()]
    }

    /// Looks up a net's ID by name.
    pub fn net_id_by_name(&self, name: &str) -> Option<NetId> {
        self.net_by_name.get(name).copied()
    }

    /// Iterates over `(id, net)` pairs.
    pub fn nets(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets
            .iter()
            .enumerate()
            .map(|(i, n)| (NetId::from_raw(i as u32), n))
    }

    /// Number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Whether any net has been created yet (governs the block/io-pin
    /// ordering invariant).
    pub fn nets_started(&self) -> bool {
        self.nets_started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ct() -> CellTypeId {
        CellTypeId::from_raw(0)
    }

    #[test]
    fn add_block_ok() {
        let mut d = Design::new();
        let id = d
            .add_block("u1", ct(), 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        assert_eq!(d.block(id).name, "u1");
        assert_eq!(d.block_count(), 1);
    }

    #[test]
    fn duplicate_block_name_fails() {
        let mut d = Design::new();
        d.add_block("u1", ct(), 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let err = d
            .add_block("u1", ct(), 1.0, 1.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap_err();
        assert!(matches!(err, DaliError::NameCollision { .. }));
    }

    #[test]
    fn block_after_net_fails() {
        let mut d = Design::new();
        d.add_net("n0", 2, 1.0).unwrap();
        let err = d
            .add_block("u1", ct(), 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap_err();
        assert!(matches!(err, DaliError::Ordering { .. }));
    }

    #[test]
    fn io_pin_after_net_fails() {
        let mut d = Design::new();
        d.add_net("n0", 2, 1.0).unwrap();
        let err = d
            .add_io_pin("clk", SignalDirection::Input, SignalUse::Clock)
            .unwrap_err();
        assert!(matches!(err, DaliError::Ordering { .. }));
    }

    #[test]
    fn net_capacity_enforced() {
        let mut d = Design::new();
        let b1 = d
            .add_block("u1", ct(), 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let b2 = d
            .add_block("u2", ct(), 1.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let b3 = d
            .add_block("u3", ct(), 2.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let n = d.add_net("n0", 2, 1.0).unwrap();
        d.add_blk_pin_to_net(n, b1, PinTemplateId::from_raw(0)).unwrap();
        d.add_blk_pin_to_net(n, b2, PinTemplateId::from_raw(0)).unwrap();
        let err = d
            .add_blk_pin_to_net(n, b3, PinTemplateId::from_raw(0))
            .unwrap_err();
        assert!(matches!(err, DaliError::Capacity { .. }));
    }

    #[test]
    fn inv_p_invariant_i2() {
        let mut d = Design::new();
        let b1 = d
            .add_block("u1", ct(), 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let n = d.add_net("n0", 1, 2.0).unwrap();
        d.add_blk_pin_to_net(n, b1, PinTemplateId::from_raw(0)).unwrap();
        assert_eq!(d.net(n).inv_p, 0.0); // P == 1

        let mut d2 = Design::new();
        let b1 = d2
            .add_block("u1", ct(), 0.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let b2 = d2
            .add_block("u2", ct(), 1.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let b3 = d2
            .add_block("u3", ct(), 2.0, 0.0, PlacementStatus::Unplaced, Orientation::N)
            .unwrap();
        let n2 = d2.add_net("n1", 3, 6.0).unwrap();
        d2.add_blk_pin_to_net(n2, b1, PinTemplateId::from_raw(0)).unwrap();
        d2.add_blk_pin_to_net(n2, b2, PinTemplateId::from_raw(0)).unwrap();
        d2.add_blk_pin_to_net(n2, b3, PinTemplateId::from_raw(0)).unwrap();
        assert_eq!(d2.net(n2).inv_p, 3.0); // 6 / (3-1)
    }

    #[test]
    fn io_pin_to_net() {
        let mut d = Design::new();
        let io = d
            .add_io_pin("clk", SignalDirection::Input, SignalUse::Clock)
            .unwrap();
        let n = d.add_net("n0", 1, 1.0).unwrap();
        d.add_io_pin_to_net(n, io).unwrap();
        assert_eq!(d.io_pin(io).net, Some(n));
        assert_eq!(d.net(n).pins.len(), 1);
    }

    #[test]
    fn movability() {
        assert!(PlacementStatus::Placed.is_movable());
        assert!(PlacementStatus::Unplaced.is_movable());
        assert!(!PlacementStatus::Fixed.is_movable());
        assert!(!PlacementStatus::Cover.is_movable());
    }

    #[test]
    fn missing_block_reference() {
        let mut d = Design::new();
        let n = d.add_net("n0", 1, 1.0).unwrap();
        let err = d
            .add_blk_pin_to_net(n, BlockId::from_raw(5), PinTemplateId::from_raw(0))
            .unwrap_err();
        assert!(matches!(err, DaliError::MissingReference { .. }));
    }

    #[test]
    fn serde_roundtrip() {
        let mut d = Design::new();
        let b1 = d
            .add_block("u1", ct(), 1.0, 2.0, PlacementStatus::Placed, Orientation::N)
            .unwrap();
        let n = d.add_net("n0", 1, 1.0).unwrap();
        d.add_blk_pin_to_net(n, b1, PinTemplateId::from_raw(0)).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        let restored: Design = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.block_count(), 1);
        assert_eq!(restored.net_count(), 1);
    }
}
