//! Error types for the Dali placement core.
//!
//! All errors are fatal to the placer run and are propagated to the caller
//! (spec.md §7): there is no local recovery. Every named error kind carries
//! the offending entity name where one is meaningful.

/// Errors that can occur while building the circuit model or running the
/// placement pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DaliError {
    /// A geometry value is not an integer multiple of the placement grid.
    #[error("grid alignment error: {what} ({value}) is not a multiple of the {axis}-grid ({grid})")]
    GridAlignment {
        /// What failed the check (e.g. "block type width").
        what: String,
        /// The offending value.
        value: f64,
        /// Which axis grid it was checked against.
        axis: char,
        /// The grid step it should have been a multiple of.
        grid: f64,
    },

    /// A duplicate entity name was added within its category.
    #[error("name collision: '{name}' already exists among {category}")]
    NameCollision {
        /// The duplicate name.
        name: String,
        /// The entity category (e.g. "block types", "blocks", "nets").
        category: String,
    },

    /// A Block or IoPin was added after a Net was created.
    #[error("ordering error: cannot add {what} '{name}' after a net has been created")]
    Ordering {
        /// The kind of entity that was added too late (e.g. "block", "io pin").
        what: String,
        /// Its name.
        name: String,
    },

    /// A pre-reserved capacity would have been exceeded.
    #[error("capacity error: net '{net}' capacity {capacity} exceeded by pin #{attempted}")]
    Capacity {
        /// The net whose capacity was exceeded.
        net: String,
        /// The declared capacity.
        capacity: usize,
        /// The 1-based pin index that would have exceeded it.
        attempted: usize,
    },

    /// A reference to an unknown entity, or a pin with no geometry.
    #[error("missing reference: {what} '{name}' not found")]
    MissingReference {
        /// What kind of reference was missing (e.g. "cell type", "block").
        what: String,
        /// The name that could not be resolved.
        name: String,
    },

    /// N/P-well rectangles are not abutted as required.
    #[error("geometry error: well shapes of '{cell_type}' do not abut along a single horizontal edge")]
    Geometry {
        /// The cell type with the malformed well shape.
        cell_type: String,
    },

    /// Aggregate block area exceeds the accumulator range for the chosen scale.
    #[error("overflow error: aggregate block area overflowed at '{context}'")]
    Overflow {
        /// Where the overflow was detected.
        context: String,
    },

    /// The Tetris detailed legalizer failed after its configured flip budget.
    #[error("legalization error: failed to place block '{block}' after {flips} flip(s)")]
    Legalization {
        /// The block that could not be legally placed.
        block: String,
        /// The number of flips attempted before giving up.
        flips: u32,
    },
}

/// Convenience alias for results from the placement core.
pub type DaliResult<T> = Result<T, DaliError>;
