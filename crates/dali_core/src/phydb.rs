//! PhyDB consumer/producer seam (spec.md §6.1/§6.2, SPEC_FULL.md §6.1-6.2).
//!
//! The core does not parse LEF/DEF/PhyDB itself; this module defines the
//! narrow in-memory shapes an external physical-design database hands in
//! and receives back, and the DEF-unit coordinate round-trip formula,
//! grounded on `dali/common/phydbhelper.{h,cc}`'s `PlaceStatusDali2PhyDB`
//! mapping in the original implementation.

use dali_common::Rect;
use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::design::{PlacementStatus, SignalDirection, SignalUse};
use crate::row::PlacementRegion;

/// Routing layer direction, as exposed by an external PhyDB (spec.md §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingDirection {
    /// Horizontal preferred routing direction.
    Horizontal,
    /// Vertical preferred routing direction.
    Vertical,
    /// 45-degree diagonal.
    Diag45,
    /// 135-degree diagonal.
    Diag135,
}

/// A routing layer definition from the PhyDB tech library (spec.md §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhydbLayer {
    /// Layer name.
    pub name: String,
    /// Preferred routing direction.
    pub direction: RoutingDirection,
    /// Minimum wire width, in microns.
    pub min_width: f64,
    /// Minimum spacing between wires, in microns.
    pub min_spacing: f64,
    /// Minimum shape area, in square microns.
    pub min_area: f64,
    /// Routing pitch along the layer's preferred axis, in microns.
    pub pitch: f64,
}

/// A single pin rectangle on a macro, grouped by layer (spec.md §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhydbPinRect {
    /// The metal layer this rectangle sits on.
    pub layer: String,
    /// The rectangle, in the macro's local coordinate frame (microns).
    pub rect: Rect,
}

/// One pin on a `PhydbMacro`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhydbPin {
    /// Pin name.
    pub name: String,
    /// Whether this pin is an input of the macro.
    pub is_input: bool,
    /// One or more rectangles, possibly on different layers.
    pub rects: Vec<PhydbPinRect>,
}

/// An optional N/P-well rectangle pair carried by a macro (spec.md §3
/// WellShape, §6.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhydbWellShape {
    /// N-well rectangle, in the macro's local frame.
    pub n_well: Option<Rect>,
    /// P-well rectangle, in the macro's local frame.
    pub p_well: Option<Rect>,
}

/// A cell-type definition ("macro") from the PhyDB tech library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhydbMacro {
    /// Macro name.
    pub name: String,
    /// Width, in microns.
    pub width: f64,
    /// Height, in microns.
    pub height: f64,
    /// The macro's pins.
    pub pins: Vec<PhydbPin>,
    /// Optional well shape.
    pub well_shape: Option<PhydbWellShape>,
}

/// Placement status as exposed by PhyDB, mirroring the original
/// implementation's `phydb::PlaceStatus` enum (`dali/common/phydbhelper.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhydbPlaceStatus {
    /// Cover shape.
    Cover,
    /// Fixed in place.
    Fixed,
    /// Placed, movable.
    Placed,
    /// Not yet placed.
    Unplaced,
}

impl From<PlacementStatus> for PhydbPlaceStatus {
    fn from(s: PlacementStatus) -> Self {
        match s {
            PlacementStatus::Cover => PhydbPlaceStatus::Cover,
            PlacementStatus::Fixed => PhydbPlaceStatus::Fixed,
            PlacementStatus::Placed => PhydbPlaceStatus::Placed,
            PlacementStatus::Unplaced => PhydbPlaceStatus::Unplaced,
        }
    }
}

impl From<PhydbPlaceStatus> for PlacementStatus {
    fn from(s: PhydbPlaceStatus) -> Self {
        match s {
            PhydbPlaceStatus::Cover => PlacementStatus::Cover,
            PhydbPlaceStatus::Fixed => PlacementStatus::Fixed,
            PhydbPlaceStatus::Placed => PlacementStatus::Placed,
            PhydbPlaceStatus::Unplaced => PlacementStatus::Unplaced,
        }
    }
}

/// A cell instance ("component") from/to PhyDB, in integer DEF-units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhydbComponent {
    /// Instance name.
    pub name: String,
    /// Name of the macro this instance is an instantiation of.
    pub macro_name: String,
    /// Lower-left x, in DEF-units.
    pub x: i64,
    /// Lower-left y, in DEF-units.
    pub y: i64,
    /// Placement status.
    pub status: PhydbPlaceStatus,
    /// Orientation, encoded the way PhyDB names it (`N`, `S`, `W`, `E`,
    /// `FN`, `FS`, `FW`, `FE`).
    pub orientation: String,
}

/// An IO pin from/to PhyDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhydbIoPin {
    /// Pin name.
    pub name: String,
    /// Signal direction.
    pub direction: SignalDirection,
    /// Signal use/role.
    pub signal_use: SignalUse,
    /// Position in DEF-units, if placed.
    pub xy: Option<(i64, i64)>,
    /// Placement status.
    pub status: PhydbPlaceStatus,
}

/// A `(component, pin)` or IO-pin reference inside a `PhydbNet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PhydbPinRef {
    /// A pin on a named component instance.
    Component {
        /// The component instance name.
        component: String,
        /// The pin name on that component's macro.
        pin: String,
    },
    /// A primary IO pin, by name.
    Io(String),
}

/// A net from/to PhyDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhydbNet {
    /// Net name.
    pub name: String,
    /// The net's pin references.
    pub pins: Vec<PhydbPinRef>,
}

/// The die area rectangle, in DEF-units (spec.md §6.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhydbDieArea {
    /// Lower-left x, in DEF-units.
    pub llx: i64,
    /// Lower-left y, in DEF-units.
    pub lly: i64,
    /// Upper-right x, in DEF-units.
    pub urx: i64,
    /// Upper-right y, in DEF-units.
    pub ury: i64,
}

/// Scale factors needed to convert between placement-grid units and
/// DEF-units (spec.md §6.2): `DEF_coord = round(coord * grid_value *
/// def_units_per_micron) + die_area_offset`.
#[derive(Debug, Clone, Copy)]
pub struct DefUnitScale {
    /// The placement grid step used to scale `coord` before conversion
    /// (typically `grid_x` for x-coordinates, `grid_y` for y).
    pub grid_value: f64,
    /// DEF distance-units per micron.
    pub def_units_per_micron: f64,
    /// The die area's lower-left offset to add back, in DEF-units.
    pub die_area_offset: i64,
}

impl DefUnitScale {
    /// Converts a placement-grid coordinate to DEF-units.
    pub fn to_def(&self, coord: f64) -> i64 {
        (coord * self.grid_value * self.def_units_per_micron).round() as i64 + self.die_area_offset
    }

    /// Converts a DEF-unit coordinate back to placement-grid units.
    pub fn from_def(&self, def_coord: i64) -> f64 {
        (def_coord - self.die_area_offset) as f64 / (self.grid_value * self.def_units_per_micron)
    }
}

impl Circuit {
    /// Builds the PhyDB-facing die-area snapshot from the circuit's
    /// placement region, if one is set.
    pub fn to_phydb_die_area(&self, scale_x: &DefUnitScale, scale_y: &DefUnitScale) -> Option<PhydbDieArea> {
        let region = self.region()?;
        Some(PhydbDieArea {
            llx: scale_x.to_def(region.llx),
            lly: scale_y.to_def(region.lly),
            urx: scale_x.to_def(region.urx()),
            ury: scale_y.to_def(region.ury()),
        })
    }

    /// Builds a `PlacementRegion` from a PhyDB die area snapshot, checking
    /// grid/row-height alignment the same way [`PlacementRegion::new`] does.
    pub fn region_from_phydb_die_area(
        die_area: PhydbDieArea,
        scale_x: &DefUnitScale,
        scale_y: &DefUnitScale,
        grid_x: f64,
        grid_y: f64,
        row_height: f64,
    ) -> crate::error::DaliResult<PlacementRegion> {
        let llx = scale_x.from_def(die_area.llx);
        let lly = scale_y.from_def(die_area.lly);
        let width = scale_x.from_def(die_area.urx) - llx;
        let height = scale_y.from_def(die_area.ury) - lly;
        PlacementRegion::new(llx, lly, width, height, grid_x, grid_y, row_height)
    }

    /// Snapshots every block's final `(llx, lly)`, orientation, and
    /// placement status as `PhydbComponent`s in DEF-units (spec.md §6.2).
    pub fn to_phydb_components(&self, scale_x: &DefUnitScale, scale_y: &DefUnitScale) -> Vec<PhydbComponent> {
        self.blocks()
            .map(|(_, b)| PhydbComponent {
                name: b.name.clone(),
                macro_name: self.cell_type(b.cell_type).name.clone(),
                x: scale_x.to_def(b.x),
                y: scale_y.to_def(b.y),
                status: b.status.into(),
                orientation: orientation_to_phydb(b.orientation),
            })
            .collect()
    }

    /// Snapshots every IO pin's final position and status as
    /// `PhydbIoPin`s in DEF-units.
    pub fn to_phydb_io_pins(&self, scale_x: &DefUnitScale, scale_y: &DefUnitScale) -> Vec<PhydbIoPin> {
        self.io_pins()
            .map(|(_, p)| PhydbIoPin {
                name: p.name.clone(),
                direction: p.direction,
                signal_use: p.signal_use,
                xy: Some((scale_x.to_def(p.x), scale_y.to_def(p.y))),
                status: p.status.into(),
            })
            .collect()
    }
}

fn orientation_to_phydb(o: dali_common::Orientation) -> String {
    use dali_common::Orientation::*;
    match o {
        N => "N",
        S => "S",
        W => "W",
        E => "E",
        FN => "FN",
        FS => "FS",
        FW => "FW",
        FE => "FE",
    }
    .to_string()
}
