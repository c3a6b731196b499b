//! Tunable constants for the placement pipeline.
//!
//! Every numeric default named in spec.md is collected here rather than
//! scattered through the solver/spreader/legalizer as magic numbers.

/// Tunable knobs for a placement run, with the defaults spec.md names.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacerConfig {
    /// Target bin filling rate for the cell spreader (spec.md §4.4).
    pub target_filling_rate: f64,
    /// Bin height as a multiple of the row height (spec.md §4.4).
    pub bin_height_factor: u32,
    /// CG convergence precision: stop when `||r||^2 / n` falls below this
    /// fraction of the average squared residual (spec.md §4.3).
    pub cg_precision: f64,
    /// Outer per-axis HPWL convergence precision (spec.md §4.3).
    pub hpwl_precision: f64,
    /// Fraction of average cell width/height used for the solver's epsilon
    /// (spec.md §4.3, OQ-2 in SPEC_FULL.md).
    pub epsilon_fraction: f64,
    /// Maximum CG iterations per axis, per rebuild.
    pub max_cg_iters: usize,
    /// Maximum number of Tetris flip-and-retry attempts (spec.md §4.5).
    pub max_flips: u32,
    /// Outer anchor-loop iteration cap (spec.md §4.6).
    pub max_outer_iters: u32,
    /// Convergence ratio rho: stop the outer loop when
    /// `|hpwl_lb - hpwl_ub| / hpwl_lb <= rho` (spec.md §4.6).
    pub rho: f64,
    /// PRNG seed for the random initial placement (spec.md §4.6, property P6).
    pub seed: u64,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            target_filling_rate: 0.9,
            bin_height_factor: 8,
            cg_precision: 0.05,
            hpwl_precision: 0.05,
            epsilon_fraction: 0.01,
            max_cg_iters: 200,
            max_flips: 5,
            max_outer_iters: 50,
            rho: 0.05,
            seed: 0,
        }
    }
}
