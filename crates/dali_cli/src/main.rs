//! Dali CLI — thin wrapper exposing the placement core's flags
//! (spec.md §6.4). LEF/DEF/Bookshelf parsing is an ancillary
//! responsibility outside this crate (spec.md §1); this binary wires a
//! synthetic benchmark circuit so the pipeline can be smoke-tested
//! end-to-end without a real design database.

#![warn(missing_docs)]

mod synthetic;

use std::process;

use clap::Parser;

use dali_core::driver::{GlobalPlacementDriver, PlacerEvent};
use dali_core::PlacerConfig;

/// Dali — an analytical placer for standard-cell digital integrated
/// circuits.
#[derive(Parser, Debug)]
#[command(name = "dali", version, about = "Dali standard-cell placer")]
pub struct Cli {
    /// LEF technology file (ancillary; not parsed by this core).
    #[arg(long = "lef")]
    pub lef: Option<String>,

    /// DEF design file (ancillary; not parsed by this core).
    #[arg(long = "def")]
    pub def: Option<String>,

    /// Bookshelf `.nodes`/`.nets`/`.scl`/... base name (ancillary).
    #[arg(long = "cell")]
    pub cell: Option<String>,

    /// Bookshelf benchmark name (ancillary).
    #[arg(short = 'b', long = "bs")]
    pub bs: Option<String>,

    /// Bookshelf `.pl` placement file to load (ancillary).
    #[arg(long = "pl")]
    pub pl: Option<String>,

    /// Placement grid step, `gx gy`.
    #[arg(short = 'g', long = "grid", num_args = 2, value_names = ["GX", "GY"])]
    pub grid: Option<Vec<f64>>,

    /// Output design name.
    #[arg(short = 'o', long = "out")]
    pub out: Option<String>,

    /// PRNG seed for the random initial placement (property P6).
    #[arg(long = "seed", default_value_t = 0)]
    pub seed: u64,

    /// Outer anchor-loop iteration cap.
    #[arg(long = "max-iters")]
    pub max_iters: Option<u32>,

    /// Number of cells in the synthetic smoke-test benchmark.
    #[arg(long = "bench-cells", default_value_t = 16)]
    pub bench_cells: usize,
}

fn main() {
    let cli = Cli::parse();

    for (flag, val) in [("-lef", &cli.lef), ("-def", &cli.def), ("-cell", &cli.cell), ("-pl", &cli.pl)] {
        if val.is_some() {
            eprintln!(
                "warning: {flag} is accepted for compatibility but LEF/DEF/Bookshelf \
                 parsing is an ancillary responsibility outside dali_core; ignoring"
            );
        }
    }

    let mut config = PlacerConfig::default();
    config.seed = cli.seed;
    if let Some(max_iters) = cli.max_iters {
        config.max_outer_iters = max_iters;
    }
    let (grid_x, grid_y) = match &cli.grid {
        Some(g) if g.len() == 2 => (g[0], g[1]),
        _ => (0.1, 0.1),
    };

    let mut circuit = synthetic::benchmark_circuit(cli.bench_cells, grid_x, grid_y);

    let mut log = |event: PlacerEvent| match event {
        PlacerEvent::RandomInitDone => println!("random init done"),
        PlacerEvent::OuterIteration { iter, hpwl_lb, hpwl_ub, alpha } => {
            println!("iter {iter}: hpwl_lb={hpwl_lb:.3} hpwl_ub={hpwl_ub:.3} alpha={alpha:.4}")
        }
        PlacerEvent::Converged { iter } => println!("converged at iter {iter}"),
        PlacerEvent::BudgetExhausted => println!("outer iteration budget exhausted"),
        PlacerEvent::LegalizeFlip { block, flips } => {
            println!("legalizer flip #{flips} triggered by block '{block}'")
        }
        PlacerEvent::LegalizeDone => println!("legalization done"),
    };

    match GlobalPlacementDriver::run(&mut circuit, &config, Some(&mut log)) {
        Ok(report) => {
            println!(
                "placed {} blocks in {} outer iteration(s), final hpwl={:.3}, converged={}",
                circuit.block_count(),
                report.outer_iterations,
                report.final_hpwl,
                report.converged,
            );
            if let Some(name) = &cli.out {
                println!(
                    "note: -o {name} requested but DEF/Bookshelf emission is ancillary \
                     and not implemented by this core"
                );
            }
            process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["dali"]);
        assert_eq!(cli.seed, 0);
        assert!(cli.max_iters.is_none());
        assert_eq!(cli.bench_cells, 16);
    }

    #[test]
    fn parse_grid_and_seed() {
        let cli = Cli::parse_from(["dali", "-g", "0.2", "0.2", "--seed", "42", "--max-iters", "10"]);
        assert_eq!(cli.grid, Some(vec![0.2, 0.2]));
        assert_eq!(cli.seed, 42);
        assert_eq!(cli.max_iters, Some(10));
    }

    #[test]
    fn parse_io_flags() {
        let cli = Cli::parse_from(["dali", "--lef", "tech.lef", "--def", "design.def", "-o", "out"]);
        assert_eq!(cli.lef.as_deref(), Some("tech.lef"));
        assert_eq!(cli.def.as_deref(), Some("design.def"));
        assert_eq!(cli.out.as_deref(), Some("out"));
    }
}
