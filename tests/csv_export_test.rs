//! Exports of a finished run. Only built with the `csv` feature.
#![cfg(feature = "csv")]

use mini_nest::config::NestConfig;
use mini_nest::distributions::CircGauss;
use mini_nest::io::csv::{save_live_points, save_trace};
use mini_nest::nest::{MaxIterations, NestedSampler};
use mini_nest::rejection::RegionSampler;
use mini_nest::stepsampler::{explore_steps, RegionSliceSampler, StepTrace};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;
use std::fs;
use tempfile::tempdir;

#[test]
fn live_points_of_a_run_round_trip_through_csv() -> Result<(), Box<dyn Error>> {
    let config = NestConfig::new(20, 3).set_seed(9);
    let result = NestedSampler::new(CircGauss::new(3, 0.2), RegionSampler::new(), config)?
        .set_stopping_rule(MaxIterations(30))
        .run()?;

    let dir = tempdir()?;
    let path = dir.path().join("live.csv");
    let filename = path.to_str().ok_or("non-utf8 path")?;
    save_live_points(&result.live, filename)?;

    let mut reader = csv::Reader::from_path(&path)?;
    assert_eq!(
        reader.headers()?.iter().collect::<Vec<_>>(),
        vec!["dim_0", "dim_1", "dim_2", "logl"]
    );
    let mut rows = 0;
    for (record, expected) in reader.records().zip(result.live.logl()) {
        let record = record?;
        assert_eq!(record.len(), 4);
        let logl: f64 = record[3].parse()?;
        assert_eq!(logl, *expected);
        rows += 1;
    }
    assert_eq!(rows, 20);
    Ok(())
}

#[test]
fn region_slice_trace_is_written_in_order() -> Result<(), Box<dyn Error>> {
    let config = NestConfig::new(30, 2).set_seed(10);
    let mut nest = NestedSampler::new(CircGauss::new(2, 0.2), RegionSampler::new(), config)?;
    let state = nest.init()?;

    let mut rng = SmallRng::seed_from_u64(10);
    let mut sampler = RegionSliceSampler::new(3, 50)?;
    let mut trace = StepTrace::new();
    let start = state.live.point(0).to_owned();
    explore_steps(
        &mut sampler,
        &state.region,
        start.view(),
        &state.live,
        nest.problem(),
        3,
        100_000,
        &mut rng,
        &mut trace,
    )?;

    let dir = tempdir()?;
    let path = dir.path().join("trace.csv");
    save_trace(&trace, path.to_str().ok_or("non-utf8 path")?)?;

    let contents = fs::read_to_string(&path)?;
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("step,event,dim_0,dim_1,logl"));
    assert!(lines.next().is_some_and(|l| l.starts_with("0,start,")));
    let accepted = contents.lines().filter(|l| l.contains(",accepted,")).count();
    assert_eq!(accepted, 3);
    Ok(())
}
