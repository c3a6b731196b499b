//! Technology library: immutable cell-type templates and their pins.
//!
//! A [`CellType`] is created once during technology load and frozen the
//! moment its last pin rectangle is added (spec.md §3/§4.1). `Tech` owns
//! the full set of `CellType`s for a `Circuit` and is the only thing that
//! grows during the load phase; everything downstream only reads it.

use dali_common::{CellTypeId, Orientation, PinTemplateId, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{DaliError, DaliResult};

/// Rectangular N-well and/or P-well regions for a `CellType`.
///
/// Invariant (spec.md §3 WellShape): when both wells are present they must
/// abut along a single horizontal edge (the N-well's bottom edge equals the
/// P-well's top edge, or vice versa), and both must span the cell's full
/// width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellShape {
    /// The N-well rectangle, if present.
    pub n_well: Option<Rect>,
    /// The P-well rectangle, if present.
    pub p_well: Option<Rect>,
}

impl WellShape {
    /// Validates the abutment invariant. Called once when a `WellShape` is
    /// attached to a frozen `CellType`.
    pub fn validate(&self, cell_type: &str) -> DaliResult<()> {
        if let (Some(n), Some(p)) = (&self.n_well, &self.p_well) {
            let abuts = (n.lly - p.ury).abs() < 1e-9 || (p.lly - n.ury).abs() < 1e-9;
            if !abuts {
                return Err(DaliError::Geometry {
                    cell_type: cell_type.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A named port on a `CellType`, with a precomputed per-orientation offset
/// table (spec.md §3 PinTemplate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinTemplate {
    /// The pin's name, unique within its owning `CellType`.
    pub name: String,
    /// Whether this pin is an input (`true`) or output (`false`).
    pub is_input: bool,
    /// The pin's geometry rectangles accumulated so far, in base (`N`)
    /// orientation.
    rects: Vec<Rect>,
    /// Whether `add_rect` has been finalized; no further rects may be added.
    finalized: bool,
    /// `(dx, dy)` offset from the owning cell's lower-left, indexed by
    /// `Orientation::ALL` order. Populated once, at finalization.
    offsets: [(f64, f64); 8],
}

impl PinTemplate {
    fn new(name: impl Into<String>, is_input: bool) -> Self {
        Self {
            name: name.into(),
            is_input,
            rects: Vec::new(),
            finalized: false,
            offsets: [(0.0, 0.0); 8],
        }
    }

    /// Adds a geometry rectangle to this pin's footprint. Fails if the pin
    /// has already been finalized (i.e. its owning cell's table has already
    /// been read).
    fn add_rect(&mut self, rect: Rect, pin_name: &str) -> DaliResult<()> {
        if self.finalized {
            return Err(DaliError::MissingReference {
                what: "pin rect target (pin already finalized)".into(),
                name: pin_name.to_string(),
            });
        }
        self.rects.push(rect);
        Ok(())
    }

    /// Finalizes the pin's offset table against its owning cell's
    /// dimensions. Idempotent after the first call.
    fn finalize(&mut self, pin_name: &str, cell_w: f64, cell_h: f64) -> DaliResult<()> {
        if self.finalized {
            return Ok(());
        }
        if self.rects.is_empty() {
            return Err(DaliError::MissingReference {
                what: "pin geometry".into(),
                name: pin_name.to_string(),
            });
        }
        let bbox = self.bounding_box();
        let (cx, cy) = bbox.center();
        for (i, o) in Orientation::ALL.iter().enumerate() {
            self.offsets[i] = o.transform_point((cx, cy), cell_w, cell_h);
        }
        self.finalized = true;
        Ok(())
    }

    /// The bounding box of all rectangles added so far.
    pub fn bounding_box(&self) -> Rect {
        let mut llx = f64::INFINITY;
        let mut lly = f64::INFINITY;
        let mut urx = f64::NEG_INFINITY;
        let mut ury = f64::NEG_INFINITY;
        for r in &self.rects {
            llx = llx.min(r.llx);
            lly = lly.min(r.lly);
            urx = urx.max(r.urx);
            ury = ury.max(r.ury);
        }
        Rect::new(llx, lly, urx, ury)
    }

    /// The `(dx, dy)` offset from a cell's lower-left under `orientation`.
    ///
    /// Panics if called before the pin has been finalized; the circuit
    /// model guarantees finalization happens before a `PinTemplate` is ever
    /// handed out for reading (invariant I4).
    pub fn offset(&self, orientation: Orientation) -> (f64, f64) {
        debug_assert!(self.finalized, "pin offset read before finalization");
        let idx = Orientation::ALL.iter().position(|o| *o == orientation).unwrap();
        self.offsets[idx]
    }
}

/// An immutable cell-type template (spec.md §3 CellType).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellType {
    /// Unique name.
    pub name: String,
    /// Width in placement-grid units.
    pub width: f64,
    /// Height in placement-grid units.
    pub height: f64,
    /// Pin templates, addressed by local index (`PinTemplateId`).
    pins: Vec<PinTemplate>,
    /// Pin name -> local index.
    pin_by_name: HashMap<String, PinTemplateId>,
    /// Optional N/P-well geometry.
    pub well_shape: Option<WellShape>,
    /// Whether the type has been frozen (no more pin rects may be added via
    /// the owning `Tech`).
    frozen: bool,
}

impl CellType {
    fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            pins: Vec::new(),
            pin_by_name: HashMap::new(),
            well_shape: None,
            frozen: false,
        }
    }

    /// Number of pin templates on this cell type.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Looks up a pin template by its local ID.
    pub fn pin(&self, id: PinTemplateId) -> &PinTemplate {
        &self.pins[id.index()]
    }

    /// Looks up a pin template's ID by name.
    pub fn pin_id_by_name(&self, name: &str) -> Option<PinTemplateId> {
        self.pin_by_name.get(name).copied()
    }

    /// Iterates over `(id, pin)` pairs.
    pub fn pins(&self) -> impl Iterator<Item = (PinTemplateId, &PinTemplate)> {
        self.pins
            .iter()
            .enumerate()
            .map(|(i, p)| (PinTemplateId::from_raw(i as u32), p))
    }
}

/// The technology library: an immutable-after-load set of `CellType`s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tech {
    cell_types: Vec<CellType>,
    cell_type_by_name: HashMap<String, CellTypeId>,
}

impl Tech {
    /// Creates an empty technology library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new cell type. `width`/`height` must be positive and exact
    /// multiples of the placement grid (spec.md §4.1 `add_block_type`).
    pub fn add_block_type(
        &mut self,
        name: &str,
        width: f64,
        height: f64,
        grid_x: f64,
        grid_y: f64,
    ) -> DaliResult<CellTypeId> {
        if self.cell_type_by_name.contains_key(name) {
            return Err(DaliError::NameCollision {
                name: name.to_string(),
                category: "block types".into(),
            });
        }
        check_grid_multiple("block type width", width, 'x', grid_x)?;
        check_grid_multiple("block type height", height, 'y', grid_y)?;
        if width <= 0.0 || height <= 0.0 {
            return Err(DaliError::GridAlignment {
                what: "block type dimensions must be positive".into(),
                value: width.min(height),
                axis: 'x',
                grid: grid_x,
            });
        }
        let id = CellTypeId::from_raw(self.cell_types.len() as u32);
        self.cell_types.push(CellType::new(name, width, height));
        self.cell_type_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Adds a pin to a cell type, or extends an existing pin's geometry if
    /// called again with the same name (spec.md §4.1 `add_pin_to_type` /
    /// `add_pin_rect`, folded into one call here: see [`Tech::add_pin_rect`]
    /// for the incremental form used by loaders that stream rects in).
    pub fn add_pin_to_type(
        &mut self,
        cell_type: CellTypeId,
        pin_name: &str,
        is_input: bool,
    ) -> DaliResult<PinTemplateId> {
        let ct = self.cell_type_mut(cell_type)?;
        if ct.pin_by_name.contains_key(pin_name) {
            return Err(DaliError::NameCollision {
                name: pin_name.to_string(),
                category: format!("pins of '{}'", ct.name),
            });
        }
        let id = PinTemplateId::from_raw(ct.pins.len() as u32);
        ct.pins.push(PinTemplate::new(pin_name, is_input));
        ct.pin_by_name.insert(pin_name.to_string(), id);
        Ok(id)
    }

    /// Adds a geometry rectangle to a pin. The first call after
    /// [`Tech::add_pin_to_type`] establishes the pin's footprint; further
    /// calls extend it. Fails if the pin has already been finalized (see
    /// [`Tech::freeze_cell_type`]).
    pub fn add_pin_rect(
        &mut self,
        cell_type: CellTypeId,
        pin: PinTemplateId,
        rect: Rect,
    ) -> DaliResult<()> {
        let ct = self.cell_type_mut(cell_type)?;
        let name = ct
            .pins
            .get(pin.index())
            .map(|p| p.name.clone())
            .ok_or_else(|| DaliError::MissingReference {
                what: "pin".into(),
                name: format!("#{}", pin.as_raw()),
            })?;
        ct.pins[pin.index()].add_rect(rect, &name)
    }

    /// Finalizes every pin's offset table for a cell type and freezes it.
    /// Must be called once, after all pins/rects for the type have been
    /// added, before the type is used in `add_block`/`add_net`.
    pub fn freeze_cell_type(&mut self, cell_type: CellTypeId) -> DaliResult<()> {
        let ct = self.cell_type_mut(cell_type)?;
        let (w, h) = (ct.width, ct.height);
        let name = ct.name.clone();
        for pin in &mut ct.pins {
            let pin_name = pin.name.clone();
            pin.finalize(&pin_name, w, h)?;
        }
        if let Some(well) = &ct.well_shape {
            well.validate(&name)?;
        }
        ct.frozen = true;
        Ok(())
    }

    /// Attaches a well shape to a cell type. Must be called before
    /// [`Tech::freeze_cell_type`].
    pub fn set_well_shape(&mut self, cell_type: CellTypeId, shape: WellShape) -> DaliResult<()> {
        let ct = self.cell_type_mut(cell_type)?;
        ct.well_shape = Some(shape);
        Ok(())
    }

    /// Looks up a cell type by ID.
    pub fn cell_type(&self, id: CellTypeId) -> &CellType {
        &self.cell_types[id.index()]
    }

    fn cell_type_mut(&mut self, id: CellTypeId) -> DaliResult<&mut CellType> {
        self.cell_types
            .get_mut(id.index())
            .ok_or_else(|| DaliError::MissingReference {
                what: "cell type".into(),
                name: format!("#{}", id.as_raw()),
            })
    }

    /// Looks up a cell type's ID by name.
    pub fn cell_type_id_by_name(&self, name: &str) -> Option<CellTypeId> {
        self.cell_type_by_name.get(name).copied()
    }

    /// Number of cell types loaded.
    pub fn cell_type_count(&self) -> usize {
        self.cell_types.len()
    }

    /// Returns whether a cell type has been frozen.
    pub fn is_frozen(&self, id: CellTypeId) -> bool {
        self.cell_types[id.index()].frozen
    }
}

pub(crate) fn check_grid_multiple(what: &str, value: f64, axis: char, grid: f64) -> DaliResult<()> {
    if grid <= 0.0 {
        return Ok(());
    }
    let ratio = value / grid;
    if (ratio - ratio.round()).abs() > 1e-6 {
        return Err(DaliError::GridAlignment {
            what: what.to_string(),
            value,
            axis,
            grid,
        });
    }
    Ok(())
}
