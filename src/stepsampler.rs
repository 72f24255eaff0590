/*!
Step samplers: random walks that find a replacement live point by moving away
from an existing one.

Four strategies share the [`StepSampler`] contract:

- [`CubeMHSampler`]: Gaussian Metropolis-Hastings jitter in the unit cube.
- [`RegionMHSampler`]: the same jitter in the whitened space of the region.
- [`CubeSliceSampler`]: slice sampling along a random coordinate axis.
- [`RegionSliceSampler`]: slice sampling along a random whitened axis.

A strategy only proposes points and adapts to feedback. The driver owns the
acceptance test: a proposal must lie strictly inside the unit cube and inside
the region, and only the first proposal passing both tests is evaluated. It is
accepted when its log-likelihood reaches the current threshold.

Every step sampler is also a [`LivePointSampler`]: one call to `propose` makes
one move attempt, and a draw is handed out once the chain has completed
`nsteps` moves since it last (re)started.

# Examples

```rust
use mini_nest::core::LivePoints;
use mini_nest::distributions::CircGauss;
use mini_nest::region::UnitCube;
use mini_nest::sampler::LivePointSampler;
use mini_nest::stepsampler::CubeMHSampler;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let mut rng = SmallRng::seed_from_u64(42);
let problem = CircGauss::new(2, 0.2);
let live = LivePoints::uniform(20, 2, &problem, &mut rng).unwrap();
let (_, lmin) = live.worst();

let mut sampler = CubeMHSampler::new(3, 10).unwrap();
let region = UnitCube::new(2);
let draw = loop {
    let proposal = sampler
        .propose(&region, lmin, &live, &problem, &mut rng)
        .unwrap();
    if let Some(draw) = proposal.draw {
        break draw;
    }
};
assert!(draw.logl >= lmin);
```
*/

use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::{debug, trace, warn};

use crate::core::{evaluate, LivePoints};
use crate::distributions::Problem;
use crate::error::NestError;
use crate::region::{in_open_cube, Region};
use crate::sampler::{check_ndraw, Draw, LivePointSampler, Proposal};
use crate::stats::AcceptanceStats;

/// Proposals per Metropolis-Hastings move.
pub const DEFAULT_NDRAW: usize = 10;

/// Receives what happens during a walk.
pub trait DiagnosticsSink {
    fn record(&mut self, event: StepEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl DiagnosticsSink for NoDiagnostics {
    fn record(&mut self, _event: StepEvent) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// An exploration starts from this point.
    Start { u: Array1<f64> },
    /// Raw output of one move, before any filtering.
    Proposed { points: Array2<f64> },
    /// None of these proposals was inside both the cube and the region.
    OutsideRegion { points: Array2<f64> },
    /// Evaluated and below the threshold.
    Rejected { u: Array1<f64>, logl: f64 },
    /// Evaluated, above the threshold, but not a move (a slice bracket end).
    Probed { u: Array1<f64>, logl: f64 },
    /// The walk moved from `from` to `u`.
    Accepted {
        from: Array1<f64>,
        u: Array1<f64>,
        logl: f64,
    },
    /// Ends of a slice bracket once both sides are fixed.
    SliceBracket {
        left: Array1<f64>,
        right: Array1<f64>,
    },
}

/// Keeps every event in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepTrace {
    pub events: Vec<StepEvent>,
}

impl StepTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the walk moved to, in order.
    pub fn accepted_points(&self) -> Vec<&Array1<f64>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StepEvent::Accepted { u, .. } => Some(u),
                _ => None,
            })
            .collect()
    }

    pub fn n_rejected(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, StepEvent::Rejected { .. }))
            .count()
    }

    pub fn n_outside(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, StepEvent::OutsideRegion { .. }))
            .count()
    }
}

impl DiagnosticsSink for StepTrace {
    fn record(&mut self, event: StepEvent) {
        self.events.push(event);
    }
}

/// Tuning and chain state owned by every step sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct Walk {
    pub nsteps: usize,
    pub max_rejects: usize,
    pub scale: f64,
    pub nudge: f64,
    nrejects: usize,
    total_rejects: usize,
    restarts: usize,
    steps: usize,
    moves: usize,
    ncalls: usize,
    last: Option<(Array1<f64>, f64)>,
    history: Vec<(Array1<f64>, f64)>,
    stats: AcceptanceStats,
}

impl Walk {
    pub fn new(nsteps: usize, max_rejects: usize) -> Result<Self, NestError> {
        if nsteps == 0 {
            return Err(NestError::InvalidConfig(
                "a step sampler needs nsteps >= 1".to_string(),
            ));
        }
        Ok(Self {
            nsteps,
            max_rejects,
            scale: 1.0,
            nudge: 1.1f64.powf(1.0 / nsteps as f64),
            nrejects: 0,
            total_rejects: 0,
            restarts: 0,
            steps: 0,
            moves: 0,
            ncalls: 0,
            last: None,
            history: Vec::new(),
            stats: AcceptanceStats::new(),
        })
    }

    /// Current reject streak.
    pub fn nrejects(&self) -> usize {
        self.nrejects
    }

    pub fn total_rejects(&self) -> usize {
        self.total_rejects
    }

    /// Restarts forced by reject streaks.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Moves completed since the chain (re)started.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Moves completed over the sampler's lifetime.
    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn ncalls(&self) -> usize {
        self.ncalls
    }

    /// Current position of the chain and its log-likelihood.
    pub fn last(&self) -> Option<&(Array1<f64>, f64)> {
        self.last.as_ref()
    }

    pub fn history(&self) -> &[(Array1<f64>, f64)] {
        &self.history
    }

    pub fn stats(&self) -> &AcceptanceStats {
        &self.stats
    }

    pub fn chain_complete(&self) -> bool {
        self.steps >= self.nsteps
    }

    /// Forgets the current position so the next move starts elsewhere.
    pub fn forget_last(&mut self) {
        self.last = None;
    }

    pub fn record_accept(&mut self, u: Array1<f64>, logl: f64) {
        self.stats.record(true);
        self.nrejects = 0;
        self.steps += 1;
        self.moves += 1;
        self.history.push((u.clone(), logl));
        self.last = Some((u, logl));
    }

    /// Counts a rejection and restarts the chain if the streak got too long.
    /// Returns whether it restarted.
    pub fn record_reject(&mut self) -> bool {
        self.stats.record(false);
        self.nrejects += 1;
        self.total_rejects += 1;
        if self.nrejects > self.max_rejects {
            trace!(nrejects = self.nrejects, scale = self.scale, "restarting chain");
            self.restarts += 1;
            self.clear_chain();
            true
        } else {
            false
        }
    }

    /// Ends a completed chain; the next move starts from a fresh point.
    pub fn finish_chain(&mut self) {
        self.clear_chain();
    }

    fn clear_chain(&mut self) {
        self.last = None;
        self.history.clear();
        self.steps = 0;
        self.nrejects = 0;
    }
}

pub trait StepSampler {
    /// Proposes one or more points reachable from `ui`. Never evaluates the
    /// likelihood.
    fn move_from(
        &mut self,
        ui: ArrayView1<f64>,
        region: &dyn Region,
        rng: &mut SmallRng,
        sink: &mut dyn DiagnosticsSink,
    ) -> Array2<f64>;

    /// Feedback after an evaluation. `ncalls` is the sampler's running count
    /// of likelihood calls.
    fn adjust_accept(
        &mut self,
        accepted: bool,
        unew: ArrayView1<f64>,
        pnew: &[f64],
        logl: f64,
        ncalls: usize,
    );

    /// Feedback when a whole batch of proposals missed the cube or region.
    fn adjust_outside_region(&mut self);

    fn walk(&self) -> &Walk;

    fn walk_mut(&mut self) -> &mut Walk;

    fn name(&self) -> &'static str;
}

fn gaussian_jitter(
    center: ArrayView1<f64>,
    scale: f64,
    ndraw: usize,
    rng: &mut SmallRng,
) -> Array2<f64> {
    let noise = Array2::from_shape_simple_fn((ndraw, center.len()), || {
        rng.sample::<f64, _>(StandardNormal)
    });
    noise * scale + &center
}

fn mh_adjust_accept(walk: &mut Walk, accepted: bool, unew: ArrayView1<f64>, logl: f64) {
    if accepted {
        walk.scale *= walk.nudge;
        walk.record_accept(unew.to_owned(), logl);
    } else {
        walk.scale /= walk.nudge;
        walk.record_reject();
    }
}

fn mh_adjust_outside_region(walk: &mut Walk, name: &str) {
    walk.scale /= walk.nudge.powi(10);
    walk.forget_last();
    debug!(sampler = name, scale = walk.scale, "all proposals outside, shrinking");
}

/// Metropolis-Hastings with isotropic Gaussian proposals in the unit cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeMHSampler {
    walk: Walk,
    ndraw: usize,
}

impl CubeMHSampler {
    pub fn new(nsteps: usize, max_rejects: usize) -> Result<Self, NestError> {
        Ok(Self {
            walk: Walk::new(nsteps, max_rejects)?,
            ndraw: DEFAULT_NDRAW,
        })
    }

    /// Proposals drawn per move attempt, at least 1.
    pub fn set_ndraw(mut self, ndraw: usize) -> Result<Self, NestError> {
        self.ndraw = check_ndraw(ndraw)?;
        Ok(self)
    }
}

impl StepSampler for CubeMHSampler {
    fn move_from(
        &mut self,
        ui: ArrayView1<f64>,
        _region: &dyn Region,
        rng: &mut SmallRng,
        _sink: &mut dyn DiagnosticsSink,
    ) -> Array2<f64> {
        gaussian_jitter(ui, self.walk.scale, self.ndraw, rng)
    }

    fn adjust_accept(
        &mut self,
        accepted: bool,
        unew: ArrayView1<f64>,
        _pnew: &[f64],
        logl: f64,
        _ncalls: usize,
    ) {
        mh_adjust_accept(&mut self.walk, accepted, unew, logl);
    }

    fn adjust_outside_region(&mut self) {
        mh_adjust_outside_region(&mut self.walk, "cubemh");
    }

    fn walk(&self) -> &Walk {
        &self.walk
    }

    fn walk_mut(&mut self) -> &mut Walk {
        &mut self.walk
    }

    fn name(&self) -> &'static str {
        "cubemh"
    }
}

/// Metropolis-Hastings with isotropic Gaussian proposals in the region's
/// whitened space.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMHSampler {
    walk: Walk,
    ndraw: usize,
}

impl RegionMHSampler {
    pub fn new(nsteps: usize, max_rejects: usize) -> Result<Self, NestError> {
        Ok(Self {
            walk: Walk::new(nsteps, max_rejects)?,
            ndraw: DEFAULT_NDRAW,
        })
    }

    /// Proposals drawn per move attempt, at least 1.
    pub fn set_ndraw(mut self, ndraw: usize) -> Result<Self, NestError> {
        self.ndraw = check_ndraw(ndraw)?;
        Ok(self)
    }
}

impl StepSampler for RegionMHSampler {
    fn move_from(
        &mut self,
        ui: ArrayView1<f64>,
        region: &dyn Region,
        rng: &mut SmallRng,
        _sink: &mut dyn DiagnosticsSink,
    ) -> Array2<f64> {
        let layer = region.transform_layer();
        let wi = layer.transform_point(ui);
        let wnew = gaussian_jitter(wi.view(), self.walk.scale, self.ndraw, rng);
        layer.untransform(wnew.view())
    }

    fn adjust_accept(
        &mut self,
        accepted: bool,
        unew: ArrayView1<f64>,
        _pnew: &[f64],
        logl: f64,
        _ncalls: usize,
    ) {
        mh_adjust_accept(&mut self.walk, accepted, unew, logl);
    }

    fn adjust_outside_region(&mut self) {
        mh_adjust_outside_region(&mut self.walk, "regionmh");
    }

    fn walk(&self) -> &Walk {
        &self.walk
    }

    fn walk_mut(&mut self) -> &mut Walk {
        &mut self.walk
    }

    fn name(&self) -> &'static str {
        "regionmh"
    }
}

/// A slice through `origin` along `direction`, in units of the direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceInterval {
    pub origin: Array1<f64>,
    pub direction: Array1<f64>,
    pub left: f64,
    pub right: f64,
    found_left: bool,
    found_right: bool,
    pending: f64,
}

impl SliceInterval {
    fn new(origin: Array1<f64>, direction: Array1<f64>, scale: f64) -> Self {
        Self {
            origin,
            direction,
            left: -scale,
            right: scale,
            found_left: false,
            found_right: false,
            pending: 0.0,
        }
    }

    /// Both ends have been stepped out.
    pub fn is_bracketed(&self) -> bool {
        self.found_left && self.found_right
    }

    pub fn point(&self, t: f64) -> Array1<f64> {
        &self.origin + &(&self.direction * t)
    }

    fn next_offset(&mut self, rng: &mut SmallRng) -> f64 {
        self.pending = if !self.found_left {
            self.left
        } else if !self.found_right {
            self.right
        } else {
            self.left + (self.right - self.left) * rng.gen::<f64>()
        };
        self.pending
    }
}

/// Stepping-out and shrinking logic shared by both slice samplers.
#[derive(Debug, Clone, PartialEq)]
struct SliceWalk {
    walk: Walk,
    interval: Option<SliceInterval>,
}

impl SliceWalk {
    fn new(nsteps: usize, max_rejects: usize) -> Result<Self, NestError> {
        Ok(Self {
            walk: Walk::new(nsteps, max_rejects)?,
            interval: None,
        })
    }

    fn propose(
        &mut self,
        ui: ArrayView1<f64>,
        direction: impl FnOnce(&mut SmallRng) -> Array1<f64>,
        rng: &mut SmallRng,
        sink: &mut dyn DiagnosticsSink,
    ) -> Array2<f64> {
        let stale = self.interval.as_ref().map_or(true, |s| s.origin != ui);
        if stale {
            let direction = direction(rng);
            self.interval = Some(SliceInterval::new(ui.to_owned(), direction, self.walk.scale));
        }
        let Some(interval) = self.interval.as_mut() else {
            return Array2::zeros((0, ui.len()));
        };
        let t = interval.next_offset(rng);
        if interval.is_bracketed() {
            sink.record(StepEvent::SliceBracket {
                left: interval.point(interval.left),
                right: interval.point(interval.right),
            });
        }
        interval.point(t).insert_axis(Axis(0))
    }

    fn feedback(&mut self, accepted: bool, unew: ArrayView1<f64>, logl: f64) {
        let Some(interval) = self.interval.as_mut() else {
            return;
        };
        if !interval.found_left {
            if accepted {
                interval.left *= 2.0;
            } else {
                interval.found_left = true;
            }
            return;
        }
        if !interval.found_right {
            if accepted {
                interval.right *= 2.0;
            } else {
                interval.found_right = true;
                if interval.right - interval.left > 2.0 * self.walk.scale {
                    self.walk.scale *= 1.1;
                } else {
                    self.walk.scale /= 1.1;
                }
            }
            return;
        }
        if accepted {
            self.interval = None;
            self.walk.record_accept(unew.to_owned(), logl);
        } else {
            if interval.pending < 0.0 {
                interval.left = interval.pending;
            } else {
                interval.right = interval.pending;
            }
            if self.walk.record_reject() {
                self.interval = None;
            }
        }
    }

    fn outside(&mut self) {
        let Some(interval) = self.interval.as_ref() else {
            return;
        };
        let pending = interval.point(interval.pending);
        self.feedback(false, pending.view(), f64::NEG_INFINITY);
    }
}

/// Slice sampling along a randomly chosen coordinate axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeSliceSampler {
    slice: SliceWalk,
}

impl CubeSliceSampler {
    pub fn new(nsteps: usize, max_rejects: usize) -> Result<Self, NestError> {
        Ok(Self {
            slice: SliceWalk::new(nsteps, max_rejects)?,
        })
    }

    pub fn interval(&self) -> Option<&SliceInterval> {
        self.slice.interval.as_ref()
    }
}

impl StepSampler for CubeSliceSampler {
    fn move_from(
        &mut self,
        ui: ArrayView1<f64>,
        _region: &dyn Region,
        rng: &mut SmallRng,
        sink: &mut dyn DiagnosticsSink,
    ) -> Array2<f64> {
        let n_dim = ui.len();
        self.slice.propose(
            ui,
            |rng| {
                let mut axis = Array1::zeros(n_dim);
                axis[rng.gen_range(0..n_dim)] = 1.0;
                axis
            },
            rng,
            sink,
        )
    }

    fn adjust_accept(
        &mut self,
        accepted: bool,
        unew: ArrayView1<f64>,
        _pnew: &[f64],
        logl: f64,
        _ncalls: usize,
    ) {
        self.slice.feedback(accepted, unew, logl);
    }

    fn adjust_outside_region(&mut self) {
        self.slice.outside();
    }

    fn walk(&self) -> &Walk {
        &self.slice.walk
    }

    fn walk_mut(&mut self) -> &mut Walk {
        &mut self.slice.walk
    }

    fn name(&self) -> &'static str {
        "cubeslice"
    }
}

/// Slice sampling along a random whitened axis of the region, mapped back to
/// the cube and normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSliceSampler {
    slice: SliceWalk,
}

impl RegionSliceSampler {
    pub fn new(nsteps: usize, max_rejects: usize) -> Result<Self, NestError> {
        Ok(Self {
            slice: SliceWalk::new(nsteps, max_rejects)?,
        })
    }

    pub fn interval(&self) -> Option<&SliceInterval> {
        self.slice.interval.as_ref()
    }
}

impl StepSampler for RegionSliceSampler {
    fn move_from(
        &mut self,
        ui: ArrayView1<f64>,
        region: &dyn Region,
        rng: &mut SmallRng,
        sink: &mut dyn DiagnosticsSink,
    ) -> Array2<f64> {
        let n_dim = ui.len();
        let layer = region.transform_layer();
        self.slice.propose(
            ui,
            |rng| {
                let mut w = layer.transform_point(ui);
                w[rng.gen_range(0..n_dim)] += 1.0;
                let direction = &layer.untransform_point(w.view()) - &ui;
                let norm = direction.dot(&direction).sqrt();
                if norm > 0.0 && norm.is_finite() {
                    direction / norm
                } else {
                    let mut axis = Array1::zeros(n_dim);
                    axis[0] = 1.0;
                    axis
                }
            },
            rng,
            sink,
        )
    }

    fn adjust_accept(
        &mut self,
        accepted: bool,
        unew: ArrayView1<f64>,
        _pnew: &[f64],
        logl: f64,
        _ncalls: usize,
    ) {
        self.slice.feedback(accepted, unew, logl);
    }

    fn adjust_outside_region(&mut self) {
        self.slice.outside();
    }

    fn walk(&self) -> &Walk {
        &self.slice.walk
    }

    fn walk_mut(&mut self) -> &mut Walk {
        &mut self.slice.walk
    }

    fn name(&self) -> &'static str {
        "regionslice"
    }
}

/// Outcome of one move attempt.
enum Attempt {
    /// No proposal inside both the cube and the region; nothing evaluated.
    Outside,
    /// One likelihood call; `moved` holds the new position if the walk moved.
    Evaluated { moved: Option<Draw> },
}

/// One move from `start`: propose, filter, evaluate the first survivor and
/// feed the outcome back to the sampler.
fn attempt<S: StepSampler + ?Sized>(
    sampler: &mut S,
    start: ArrayView1<f64>,
    region: &dyn Region,
    lmin: f64,
    problem: &dyn Problem,
    rng: &mut SmallRng,
    sink: &mut dyn DiagnosticsSink,
) -> Result<Attempt, NestError> {
    let proposals = sampler.move_from(start, region, rng, sink);
    sink.record(StepEvent::Proposed {
        points: proposals.clone(),
    });

    let in_cube: Vec<usize> = proposals
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(_, u)| in_open_cube(*u))
        .map(|(i, _)| i)
        .collect();
    let candidates = proposals.select(Axis(0), &in_cube);
    let inside = region.inside(candidates.view());
    let Some(first) = inside.iter().position(|&b| b) else {
        sink.record(StepEvent::OutsideRegion { points: proposals });
        sampler.adjust_outside_region();
        return Ok(Attempt::Outside);
    };

    let unew = candidates.row(first).to_owned();
    let (v, logl) = evaluate(problem, unew.view())?;
    let walk = sampler.walk_mut();
    walk.ncalls += 1;
    let ncalls = walk.ncalls;
    let moves_before = walk.moves;

    let accepted = logl >= lmin;
    sampler.adjust_accept(accepted, unew.view(), &v, logl, ncalls);

    if sampler.walk().moves > moves_before {
        sink.record(StepEvent::Accepted {
            from: start.to_owned(),
            u: unew.clone(),
            logl,
        });
        Ok(Attempt::Evaluated {
            moved: Some(Draw { u: unew, v, logl }),
        })
    } else {
        sink.record(if accepted {
            StepEvent::Probed { u: unew, logl }
        } else {
            StepEvent::Rejected { u: unew, logl }
        });
        Ok(Attempt::Evaluated { moved: None })
    }
}

/// Where the next move starts: the chain's current position while it is
/// still above `lmin`, else the latest history point above `lmin` inside the
/// region, else a random live point inside the region.
fn choose_start<S: StepSampler + ?Sized>(
    sampler: &mut S,
    region: &dyn Region,
    lmin: f64,
    live: &LivePoints,
    rng: &mut SmallRng,
) -> Result<Array1<f64>, NestError> {
    let walk = sampler.walk_mut();
    if let Some((u, logl)) = &walk.last {
        if *logl >= lmin {
            return Ok(u.clone());
        }
    }
    let resumed = walk
        .history
        .iter()
        .rev()
        .find(|(u, logl)| *logl >= lmin && region.contains(u.view()))
        .cloned();
    let (u, logl) = match resumed {
        Some(point) => point,
        None => random_live_point_inside(region, live, rng)?,
    };
    walk.last = Some((u.clone(), logl));
    Ok(u)
}

/// A live point chosen uniformly among those inside the region.
pub fn random_live_point_inside(
    region: &dyn Region,
    live: &LivePoints,
    rng: &mut SmallRng,
) -> Result<(Array1<f64>, f64), NestError> {
    let guess = rng.gen_range(0..live.len());
    if region.contains(live.point(guess)) {
        return Ok((live.point(guess).to_owned(), live.logl()[guess]));
    }
    let inside: Vec<usize> = region
        .inside(live.u().view())
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b)
        .map(|(i, _)| i)
        .collect();
    if inside.is_empty() {
        return Err(NestError::EmptyRegion);
    }
    let pick = inside[rng.gen_range(0..inside.len())];
    Ok((live.point(pick).to_owned(), live.logl()[pick]))
}

impl<S: StepSampler> LivePointSampler for S {
    fn propose(
        &mut self,
        region: &dyn Region,
        lmin: f64,
        live: &LivePoints,
        problem: &dyn Problem,
        rng: &mut SmallRng,
    ) -> Result<Proposal, NestError> {
        let start = choose_start(self, region, lmin, live, rng)?;
        match attempt(self, start.view(), region, lmin, problem, rng, &mut NoDiagnostics)? {
            Attempt::Outside => Ok(Proposal::failed(0)),
            Attempt::Evaluated { moved: Some(draw) } if self.walk().chain_complete() => {
                self.walk_mut().finish_chain();
                Ok(Proposal::accepted(draw, 1))
            }
            Attempt::Evaluated { .. } => Ok(Proposal::failed(1)),
        }
    }

    fn name(&self) -> &'static str {
        StepSampler::name(self)
    }
}

/// Result of [`explore_steps`].
#[derive(Debug, Clone, PartialEq)]
pub struct Exploration {
    /// Every point the walk moved to, in order.
    pub path: Vec<Draw>,
    pub ncalls: usize,
    pub attempts: usize,
}

/// Walks `nsteps` moves from `start` at the threshold of `live`, reporting
/// every event to `sink`. Fails with [`NestError::Stalled`] after
/// `max_attempts` move attempts.
#[allow(clippy::too_many_arguments)]
pub fn explore_steps<S: StepSampler + ?Sized>(
    sampler: &mut S,
    region: &dyn Region,
    start: ArrayView1<f64>,
    live: &LivePoints,
    problem: &dyn Problem,
    nsteps: usize,
    max_attempts: usize,
    rng: &mut SmallRng,
    sink: &mut dyn DiagnosticsSink,
) -> Result<Exploration, NestError> {
    let (_, lmin) = live.worst();
    let mut current = start.to_owned();
    sink.record(StepEvent::Start { u: current.clone() });

    let mut path = Vec::with_capacity(nsteps);
    let mut ncalls = 0;
    let mut attempts = 0;
    while path.len() < nsteps {
        if attempts >= max_attempts {
            warn!(sampler = StepSampler::name(sampler), attempts, lmin, "exploration stalled");
            return Err(NestError::Stalled { attempts, lmin });
        }
        attempts += 1;
        if let Attempt::Evaluated { moved } =
            attempt(sampler, current.view(), region, lmin, problem, rng, sink)?
        {
            ncalls += 1;
            if let Some(draw) = moved {
                current = draw.u.clone();
                path.push(draw);
            }
        }
    }
    Ok(Exploration {
        path,
        ncalls,
        attempts,
    })
}
