//! Cell Spreader (spec.md §4.4): grid-bin density analysis, overfilled-bin
//! clustering, and recursive bipartition with row-aligned leaf placement.

pub mod bipartition;
pub mod cluster;
pub mod grid;

pub use bipartition::spread_pass;
