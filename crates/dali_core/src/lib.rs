//! The analytical standard-cell placement core: a pipeline of five
//! cooperating components running leaves-first over a `Circuit` graph.
//!
//! This crate takes a [`Circuit`] (tech library, design instances, and a
//! row-based placement region) and computes a legal, low-wirelength
//! `(llx, lly, orientation)` for every movable `Block` and `IoPin`.
//!
//! # Pipeline
//!
//! 1. **Random initialization** — seed every movable Block at a uniform,
//!    row-aligned position.
//! 2. **Quadratic solve** — alternate per-axis B2B-weighted CG solves to
//!    a continuous, overlap-free-in-the-limit lower bound.
//! 3. **Cell spreading** — recursive bin-based bipartition produces a
//!    density-legal upper bound.
//! 4. **Anchor-pulled re-solve** — feed the spread positions back as
//!    pseudo-anchors with rising weight until the bounds converge.
//! 5. **Detailed legalization** — Tetris-style row/site snapping with
//!    bounded flip-and-retry recovery.
//!
//! # Usage
//!
//! ```ignore
//! use dali_core::{circuit::Circuit, config::PlacerConfig, driver::GlobalPlacementDriver};
//!
//! let mut circuit = Circuit::new(0.1, 0.1);
//! // ... build cell types, blocks, nets, region, rows ...
//! let report = GlobalPlacementDriver::run(&mut circuit, &PlacerConfig::default(), None)?;
//! assert!(report.final_hpwl.is_finite());
//! # Ok::<(), dali_core::error::DaliError>(())
//! ```

#![warn(missing_docs)]

pub mod bound_tracker;
pub mod circuit;
pub mod config;
pub mod design;
pub mod driver;
pub mod error;
pub mod legalize;
pub mod phydb;
pub mod row;
pub mod solver;
pub mod spread;
pub mod tech;

pub use circuit::Circuit;
pub use config::PlacerConfig;
pub use driver::{DriverReport, GlobalPlacementDriver, PlacerEvent};
pub use error::{DaliError, DaliResult};
