//! Runs every sampler on a 2D Gaussian side by side and prints how much each
//! run cost.

use mini_nest::config::NestConfig;
use mini_nest::distributions::CircGauss;
use mini_nest::nest::explore_all_progress;
use mini_nest::sampler::SamplerKind;
use std::error::Error;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

fn setup_logging() {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    tracing_subscriber::registry()
        .with(LevelFilter::WARN)
        .with(stderr_layer)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    const N_LIVE: usize = 100;
    const N_DIM: usize = 2;
    const NSTEPS: usize = 4;
    const MAX_REJECTS: usize = 50;
    const SEED: u64 = 42;

    setup_logging();

    let problem = CircGauss::new(N_DIM, 0.05);
    let config = NestConfig::new(N_LIVE, N_DIM).set_seed(SEED);
    let results = explore_all_progress(&problem, &SamplerKind::ALL, &config, NSTEPS, MAX_REJECTS);

    println!(
        "{:<11} {:>10} {:>10} {:>12} {:>9}",
        "sampler", "iterations", "ncalls", "lmin", "regions"
    );
    for (kind, result) in results {
        let result = result.map_err(|e| format!("{kind} failed: {e}"))?;
        println!(
            "{:<11} {:>10} {:>10} {:>12.4} {:>9}",
            kind, result.iterations, result.ncalls, result.lmin, result.regions_replaced
        );
    }
    Ok(())
}

#[test]
fn test_main() {
    main().expect("Expected main to not return an error.");
}
