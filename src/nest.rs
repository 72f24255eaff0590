/*!
The live-point evolution loop.

[`NestedSampler`] keeps a fixed population of live points in the unit cube.
Each iteration replaces the lowest live point by a proposal from a
[`LivePointSampler`] that strictly exceeds it. Every `refresh_interval`
iterations the transform layer and region are rebuilt from the current live
points; the new region only replaces the old one if its volume estimate is not
larger.

# Examples

```rust
use mini_nest::config::NestConfig;
use mini_nest::distributions::CircGauss;
use mini_nest::nest::NestedSampler;
use mini_nest::rejection::RegionSampler;

let config = NestConfig::new(40, 2).set_seed(3);
let mut nest = NestedSampler::new(CircGauss::new(2, 0.1), RegionSampler::new(), config).unwrap();
let result = nest.run().unwrap();

assert_eq!(result.live.len(), 40);
assert!(result.good_iterations > 80);
assert!(result.thresholds.windows(2).all(|w| w[0] <= w[1]));
```
*/

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::NestConfig;
use crate::core::LivePoints;
use crate::distributions::Problem;
use crate::error::{DuringPhase, NestError, Phase};
use crate::region::{MLFriends, Region};
use crate::sampler::{Draw, LivePointSampler, SamplerKind};
use crate::transform::{Layer, TransformLayer};

const PROGRESS_TEMPLATE: &str = "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

/// Decides when a run is over.
pub trait StoppingRule {
    fn should_stop(&self, state: &NestState) -> bool;

    /// Number of good iterations the rule waits for, if known. Only used to
    /// size progress bars.
    fn expected_iterations(&self) -> Option<u64> {
        None
    }
}

/// Stops once more than `limit` iterations had a threshold whose likelihood
/// contour has finite volume according to [`Problem::volume`].
///
/// This is a heuristic, not a convergence test: it runs a fixed multiple of
/// the live-point count through the finite-volume part of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoodIterationRule {
    pub limit: usize,
}

impl GoodIterationRule {
    pub fn new(n_live: usize, multiplier: usize) -> Self {
        Self {
            limit: n_live * multiplier,
        }
    }
}

impl StoppingRule for GoodIterationRule {
    fn should_stop(&self, state: &NestState) -> bool {
        state.good_iterations > self.limit
    }

    fn expected_iterations(&self) -> Option<u64> {
        Some(self.limit as u64 + 1)
    }
}

/// Stops after a fixed number of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxIterations(pub usize);

impl StoppingRule for MaxIterations {
    fn should_stop(&self, state: &NestState) -> bool {
        state.iteration >= self.0
    }
}

/// What happened at one region refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshRecord {
    pub iteration: usize,
    pub minvol: f64,
    pub previous_volume: f64,
    pub candidate_volume: f64,
    pub replaced: bool,
}

/// Mutable state of a run between iterations.
#[derive(Debug, Clone)]
pub struct NestState {
    pub region: MLFriends<Layer>,
    pub live: LivePoints,
    /// Completed replacement iterations.
    pub iteration: usize,
    pub good_iterations: usize,
    /// Likelihood calls spent by the sampler.
    pub ncalls: usize,
    /// Threshold of the latest iteration (the initial minimum before any).
    pub lmin: f64,
    pub thresholds: Vec<f64>,
    pub refreshes: Vec<RefreshRecord>,
    pub regions_replaced: usize,
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct NestResult {
    pub region: MLFriends<Layer>,
    pub iterations: usize,
    pub lmin: f64,
    pub live: LivePoints,
    pub ncalls: usize,
    pub good_iterations: usize,
    pub refreshes: Vec<RefreshRecord>,
    pub regions_replaced: usize,
    pub thresholds: Vec<f64>,
}

impl From<NestState> for NestResult {
    fn from(state: NestState) -> Self {
        Self {
            region: state.region,
            iterations: state.iteration,
            lmin: state.lmin,
            live: state.live,
            ncalls: state.ncalls,
            good_iterations: state.good_iterations,
            refreshes: state.refreshes,
            regions_replaced: state.regions_replaced,
            thresholds: state.thresholds,
        }
    }
}

pub struct NestedSampler<P, S> {
    problem: P,
    sampler: S,
    config: NestConfig,
    stopping: Box<dyn StoppingRule + Send + Sync>,
    rng: SmallRng,
}

impl<P: Problem, S: LivePointSampler> NestedSampler<P, S> {
    /// Validates `config` and seeds the generator from `config.seed`.
    pub fn new(problem: P, sampler: S, config: NestConfig) -> Result<Self, NestError> {
        config.validate()?;
        Ok(Self {
            problem,
            sampler,
            stopping: Box::new(GoodIterationRule::new(
                config.n_live,
                config.termination_multiplier,
            )),
            rng: SmallRng::seed_from_u64(config.seed),
            config,
        })
    }

    /// Reseeds the generator.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn set_stopping_rule<R: StoppingRule + Send + Sync + 'static>(mut self, rule: R) -> Self {
        self.stopping = Box::new(rule);
        self
    }

    pub fn config(&self) -> &NestConfig {
        &self.config
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    /// Draws the initial live points and fits the first region.
    pub fn init(&mut self) -> Result<NestState, NestError> {
        self.initialize().during(Phase::Initialization, 0)
    }

    fn initialize(&mut self) -> Result<NestState, NestError> {
        let NestConfig {
            n_live,
            n_dim,
            n_bootstraps,
            initial_minvol,
            layer,
            ..
        } = self.config;
        let live = LivePoints::uniform(n_live, n_dim, &self.problem, &mut self.rng)?;
        let points = live.u().view();

        let mut layer = layer.build(n_dim);
        layer.optimize(points, points, 0.0)?;
        let mut region = MLFriends::build(points, layer, n_bootstraps, &mut self.rng)?;
        region.create_ellipsoid(initial_minvol)?;

        let (_, lmin) = live.worst();
        debug!(
            max_radius_sq = region.max_radius_sq(),
            enlarge = region.enlarge(),
            volume = region.estimate_volume(),
            "initial region fitted"
        );
        Ok(NestState {
            region,
            live,
            iteration: 0,
            good_iterations: 0,
            ncalls: 0,
            lmin,
            thresholds: Vec::new(),
            refreshes: Vec::new(),
            regions_replaced: 0,
        })
    }

    /// Runs one replacement iteration. Returns `true` once the stopping rule
    /// fires.
    pub fn step(&mut self, state: &mut NestState) -> Result<bool, NestError> {
        let iteration = state.iteration;
        if iteration % self.config.refresh_interval() == 0 {
            self.refresh(state).during(Phase::Refresh, iteration)?;
        }

        let (worst, lmin) = state.live.worst();
        let draw = self
            .replacement(state, lmin)
            .during(Phase::Proposal, iteration)?;
        state.live.replace(worst, draw.u.view(), draw.logl);

        state.iteration += 1;
        state.lmin = lmin;
        state.thresholds.push(lmin);
        if self.problem.volume(lmin).is_finite() {
            state.good_iterations += 1;
        }
        trace!(
            iteration = state.iteration,
            lmin,
            logl = draw.logl,
            ncalls = state.ncalls,
            "replaced worst live point"
        );
        Ok(self.stopping.should_stop(state))
    }

    /// Rebuilds layer and region, keeping the old region if the new one is
    /// larger. The ellipsoid of the kept region is refitted either way.
    #[instrument(level = "debug", skip_all, fields(iteration = state.iteration))]
    fn refresh(&mut self, state: &mut NestState) -> Result<(), NestError> {
        let minvol = (1.0 - 1.0 / self.config.n_live as f64).powf(state.iteration as f64);
        let points = state.live.u().view();
        let layer =
            state
                .region
                .layer()
                .create_new(points, state.region.max_radius_sq(), minvol)?;
        let candidate = MLFriends::build(points, layer, self.config.n_bootstraps, &mut self.rng)?;

        let (previous_volume, candidate_volume, replaced) =
            compare_volumes(&state.region, &candidate);
        if replaced {
            state.region = candidate;
            state.regions_replaced += 1;
        }
        state.region.create_ellipsoid(minvol)?;

        debug!(minvol, previous_volume, candidate_volume, replaced, "region refreshed");
        state.refreshes.push(RefreshRecord {
            iteration: state.iteration,
            minvol,
            previous_volume,
            candidate_volume,
            replaced,
        });
        Ok(())
    }

    /// Asks the sampler until a draw strictly exceeds `lmin`.
    fn replacement(&mut self, state: &mut NestState, lmin: f64) -> Result<Draw, NestError> {
        let mut failures = 0;
        loop {
            let proposal = self.sampler.propose(
                &state.region,
                lmin,
                &state.live,
                &self.problem,
                &mut self.rng,
            )?;
            state.ncalls += proposal.ncalls;
            match proposal.draw {
                Some(draw) if draw.logl > lmin => return Ok(draw),
                _ => {
                    failures += 1;
                    if failures >= self.config.max_failed_proposals {
                        warn!(
                            sampler = self.sampler.name(),
                            failures,
                            lmin,
                            "no proposal exceeded the threshold"
                        );
                        return Err(NestError::Stalled {
                            attempts: failures,
                            lmin,
                        });
                    }
                }
            }
        }
    }

    /// Initializes and iterates until the stopping rule fires.
    pub fn run(&mut self) -> Result<NestResult, NestError> {
        let mut state = self.init()?;
        info!(
            sampler = self.sampler.name(),
            n_live = self.config.n_live,
            n_dim = self.config.n_dim,
            seed = self.config.seed,
            "starting run"
        );
        while !self.step(&mut state)? {}
        self.finish(state)
    }

    /// Like [`NestedSampler::run`], advancing `pb` with every good iteration.
    pub fn run_with_progress(&mut self, pb: &ProgressBar) -> Result<NestResult, NestError> {
        let mut state = self.init()?;
        if let Some(len) = self.stopping.expected_iterations() {
            pb.set_length(len);
        }
        loop {
            let done = self.step(&mut state)?;
            pb.set_position(state.good_iterations as u64);
            pb.set_message(format!("lmin {:.3}", state.lmin));
            if done {
                break;
            }
        }
        pb.finish_with_message("Done!");
        self.finish(state)
    }

    /// Like [`NestedSampler::run`], with a progress bar on stderr.
    pub fn run_progress(&mut self) -> Result<NestResult, NestError> {
        let pb = ProgressBar::new(0);
        pb.set_style(progress_style());
        pb.set_prefix(self.sampler.name());
        self.run_with_progress(&pb)
    }

    fn finish(&self, state: NestState) -> Result<NestResult, NestError> {
        info!(
            iterations = state.iteration,
            ncalls = state.ncalls,
            lmin = state.lmin,
            regions_replaced = state.regions_replaced,
            "run finished"
        );
        Ok(state.into())
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Runs one identically seeded evolution per sampler kind, in parallel.
pub fn explore_all<P: Problem + Sync>(
    problem: &P,
    kinds: &[SamplerKind],
    config: &NestConfig,
    nsteps: usize,
    max_rejects: usize,
) -> Vec<(SamplerKind, Result<NestResult, NestError>)> {
    kinds
        .par_iter()
        .map(|&kind| {
            let result = kind
                .build(nsteps, max_rejects)
                .and_then(|sampler| NestedSampler::new(problem, sampler, config.clone()))
                .and_then(|mut nest| nest.run());
            (kind, result)
        })
        .collect()
}

/// [`explore_all`] with one progress bar per run.
pub fn explore_all_progress<P: Problem + Sync>(
    problem: &P,
    kinds: &[SamplerKind],
    config: &NestConfig,
    nsteps: usize,
    max_rejects: usize,
) -> Vec<(SamplerKind, Result<NestResult, NestError>)> {
    let multi = MultiProgress::new();
    let style = progress_style();
    kinds
        .par_iter()
        .map(|&kind| {
            let pb = multi.add(ProgressBar::new(0));
            pb.set_prefix(format!("{kind:<11}"));
            pb.set_style(style.clone());
            let result = kind
                .build(nsteps, max_rejects)
                .and_then(|sampler| NestedSampler::new(problem, sampler, config.clone()))
                .and_then(|mut nest| nest.run_with_progress(&pb));
            if let Err(e) = &result {
                pb.abandon_with_message(e.to_string());
            }
            (kind, result)
        })
        .collect()
}

/// Volume estimates of the current and the candidate region, and whether the
/// candidate may take over. The region never grows on a refresh.
fn compare_volumes(previous: &dyn Region, candidate: &dyn Region) -> (f64, f64, bool) {
    let previous_volume = previous.estimate_volume();
    let candidate_volume = candidate.estimate_volume();
    (previous_volume, candidate_volume, candidate_volume <= previous_volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{CircGauss, FnProblem, UniformDisk};
    use crate::rejection::RegionSampler;
    use crate::stepsampler::CubeMHSampler;
    use crate::transform::ScalingLayer;
    use ndarray::Array2;
    use std::cell::Cell;

    #[test]
    fn first_step_refreshes_region() {
        let config = NestConfig::new(40, 2);
        let mut nest = NestedSampler::new(UniformDisk::new(2), RegionSampler::new(), config).unwrap();
        let mut state = nest.init().unwrap();
        assert_eq!(state.iteration, 0);
        assert!(state.refreshes.is_empty());

        assert!(!nest.step(&mut state).unwrap());
        assert_eq!(state.iteration, 1);
        assert_eq!(state.refreshes.len(), 1);
        let refresh = state.refreshes[0];
        assert_eq!(refresh.minvol, 1.0);
        let volume = state.region.estimate_volume();
        assert!(volume > 0.0 && volume <= 1.0, "{volume}");
        assert_eq!(state.live.len(), 40);
    }

    #[test]
    fn refresh_follows_the_interval() {
        let config = NestConfig::new(20, 2).set_refresh_fraction(0.25);
        let mut nest = NestedSampler::new(CircGauss::new(2, 0.2), RegionSampler::new(), config)
            .unwrap()
            .set_stopping_rule(MaxIterations(23));
        let mut state = nest.init().unwrap();
        while !nest.step(&mut state).unwrap() {}
        assert_eq!(state.iteration, 23);
        let at: Vec<usize> = state.refreshes.iter().map(|r| r.iteration).collect();
        assert_eq!(at, vec![0, 5, 10, 15, 20]);
        for record in &state.refreshes {
            assert_eq!(record.replaced, record.candidate_volume <= record.previous_volume);
        }
    }

    #[test]
    fn full_support_terminates_at_two_n_plus_one() {
        let flat_gauss = FnProblem::new(
            |x: &[f64]| -x.iter().map(|xi| (xi - 0.5).powi(2)).sum::<f64>(),
            |u: &[f64]| u.to_vec(),
        );
        let config = NestConfig::new(20, 2).set_seed(4);
        let mut nest = NestedSampler::new(flat_gauss, RegionSampler::new(), config).unwrap();
        let result = nest.run().unwrap();
        assert_eq!(result.iterations, 41);
        assert_eq!(result.good_iterations, 41);
        assert_eq!(result.thresholds.len(), 41);
    }

    #[test]
    fn stalls_on_a_plateau() {
        let plateau = FnProblem::new(|_: &[f64]| 0.0, |u: &[f64]| u.to_vec());
        let config = NestConfig::new(10, 2).set_max_failed_proposals(25);
        let mut nest =
            NestedSampler::new(plateau, CubeMHSampler::new(1, 0).unwrap(), config).unwrap();
        let err = nest.run().unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Proposal));
        assert!(matches!(
            err.root(),
            NestError::Stalled {
                attempts: 25,
                lmin,
            } if *lmin == 0.0
        ));
    }

    #[test]
    fn invalid_config_fails_before_sampling() {
        let result = NestedSampler::new(
            CircGauss::new(2, 0.1),
            RegionSampler::new(),
            NestConfig::new(1, 2),
        );
        assert!(matches!(result, Err(NestError::InvalidConfig(_))));
    }

    #[test]
    fn non_finite_likelihood_aborts_initialization() {
        let broken = FnProblem::new(
            |x: &[f64]| if x[0] > 0.5 { f64::NAN } else { 0.0 },
            |u: &[f64]| u.to_vec(),
        );
        let mut nest =
            NestedSampler::new(broken, RegionSampler::new(), NestConfig::new(20, 2)).unwrap();
        let err = nest.init().unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Initialization));
        assert!(matches!(err.root(), NestError::NonFiniteLikelihood { .. }));
    }

    #[test]
    fn non_finite_likelihood_after_initialization_aborts_proposal() {
        let calls = Cell::new(0usize);
        let turns_bad = FnProblem::new(
            |_: &[f64]| {
                calls.set(calls.get() + 1);
                if calls.get() > 20 {
                    f64::NAN
                } else {
                    0.0
                }
            },
            |u: &[f64]| u.to_vec(),
        );
        let mut nest =
            NestedSampler::new(turns_bad, RegionSampler::new(), NestConfig::new(20, 2)).unwrap();
        let mut state = nest.init().unwrap();
        assert_eq!(calls.get(), 20);

        let err = nest.step(&mut state).unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Proposal));
        assert!(matches!(err.root(), NestError::NonFiniteLikelihood { .. }));
        assert_eq!(state.iteration, 0);
    }

    fn ball_region(n_dim: usize, max_radius_sq: f64) -> MLFriends<ScalingLayer> {
        let points = Array2::from_elem((4, n_dim), 0.5);
        let mut region = MLFriends::new(points.view(), ScalingLayer::new(n_dim));
        region.set_enlargement(max_radius_sq, 1.0);
        region
    }

    #[test]
    fn larger_candidate_is_rejected_above_unit_volume() {
        let current = ball_region(8, 1.0);
        let larger = ball_region(8, 2.0);
        let smaller = ball_region(8, 0.9);

        let (previous_volume, candidate_volume, replaced) = compare_volumes(&current, &larger);
        assert!(previous_volume > 1.0, "{previous_volume}");
        assert!(candidate_volume > previous_volume, "{candidate_volume}");
        assert!(!replaced);

        let (_, candidate_volume, replaced) = compare_volumes(&current, &smaller);
        assert!(candidate_volume > 1.0, "{candidate_volume}");
        assert!(replaced);
        assert!(compare_volumes(&current, &current).2);
    }

    #[test]
    fn reseeding_changes_the_run() {
        let config = NestConfig::new(20, 2);
        let run = |seed: u64| {
            NestedSampler::new(CircGauss::new(2, 0.1), RegionSampler::new(), config.clone())
                .unwrap()
                .set_seed(seed)
                .set_stopping_rule(MaxIterations(10))
                .run()
                .unwrap()
        };
        let a = run(1);
        let b = run(1);
        let c = run(2);
        assert_eq!(a.live, b.live);
        assert_eq!(a.ncalls, b.ncalls);
        assert_ne!(a.live, c.live);
    }

    #[test]
    fn explore_all_runs_every_kind() {
        let config = NestConfig::new(20, 2).set_seed(5);
        let problem = CircGauss::new(2, 0.15);
        let results = explore_all(&problem, &SamplerKind::ALL, &config, 2, 20);
        assert_eq!(results.len(), 5);
        for (kind, result) in results {
            let result = result.unwrap_or_else(|e| panic!("{kind} failed: {e}"));
            assert_eq!(result.good_iterations, 41, "{kind}");
            assert!(result.iterations >= 41);
            assert_eq!(result.live.len(), 20);
        }
    }
}
