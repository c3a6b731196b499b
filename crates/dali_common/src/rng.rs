//! Deterministic PRNG helper.
//!
//! The placer's random initial placement (spec.md §4.6) must be reproducible
//! given a fixed seed (property P6). All randomness in the pipeline flows
//! through a single `StdRng` created here so there is exactly one place that
//! turns a `u64` seed into a random stream.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Creates a deterministic PRNG from a `u64` seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
