//! Shared primitives for the Dali standard-cell placer.
//!
//! This crate has no placement logic of its own; it supplies the opaque ID
//! newtypes, geometry, and PRNG seeding that `dali_core` builds on.

#![warn(missing_docs)]

pub mod geom;
pub mod ids;
pub mod rng;

pub use geom::{Orientation, Rect};
pub use ids::{BlockId, CellTypeId, IoPinId, NetId, PinTemplateId, RowId};
pub use rng::seeded_rng;
