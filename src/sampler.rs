/*!
The interface between the evolution loop and the strategies that propose
replacement points, plus runtime selection of a strategy by name.

```rust
use mini_nest::sampler::SamplerKind;

let kind: SamplerKind = "regionslice".parse().unwrap();
assert_eq!(kind, SamplerKind::RegionSlice);
assert_eq!(kind.to_string(), "regionslice");
let sampler = kind.build(4, 10).unwrap();
assert_eq!(sampler.kind(), kind);
```
*/

use ndarray::Array1;
use rand::rngs::SmallRng;
use std::fmt;
use std::str::FromStr;

use crate::core::LivePoints;
use crate::distributions::Problem;
use crate::error::NestError;
use crate::region::Region;
use crate::rejection::RegionSampler;
use crate::stepsampler::{
    CubeMHSampler, CubeSliceSampler, RegionMHSampler, RegionSliceSampler, StepSampler,
};

/// An evaluated candidate: cube position, physical parameters and
/// log-likelihood.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub u: Array1<f64>,
    pub v: Vec<f64>,
    pub logl: f64,
}

/// Outcome of one `propose` call and the likelihood calls it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub draw: Option<Draw>,
    pub ncalls: usize,
}

impl Proposal {
    pub fn accepted(draw: Draw, ncalls: usize) -> Self {
        Self {
            draw: Some(draw),
            ncalls,
        }
    }

    pub fn failed(ncalls: usize) -> Self {
        Self { draw: None, ncalls }
    }
}

/// Proposes replacements for the worst live point.
pub trait LivePointSampler {
    /// Makes one attempt at a point above `lmin`. A returned draw is only a
    /// candidate: the caller still checks it strictly exceeds the threshold.
    fn propose(
        &mut self,
        region: &dyn Region,
        lmin: f64,
        live: &LivePoints,
        problem: &dyn Problem,
        rng: &mut SmallRng,
    ) -> Result<Proposal, NestError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    CubeMH,
    RegionMH,
    CubeSlice,
    RegionSlice,
    /// Direct rejection sampling from the region.
    RegionRejection,
}

impl SamplerKind {
    pub const ALL: [SamplerKind; 5] = [
        SamplerKind::CubeMH,
        SamplerKind::RegionMH,
        SamplerKind::CubeSlice,
        SamplerKind::RegionSlice,
        SamplerKind::RegionRejection,
    ];

    pub const STEPPING: [SamplerKind; 4] = [
        SamplerKind::CubeMH,
        SamplerKind::RegionMH,
        SamplerKind::CubeSlice,
        SamplerKind::RegionSlice,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SamplerKind::CubeMH => "cubemh",
            SamplerKind::RegionMH => "regionmh",
            SamplerKind::CubeSlice => "cubeslice",
            SamplerKind::RegionSlice => "regionslice",
            SamplerKind::RegionRejection => "mlfriends",
        }
    }

    /// Creates the sampler. `nsteps` and `max_rejects` only apply to the
    /// stepping strategies.
    pub fn build(self, nsteps: usize, max_rejects: usize) -> Result<AnySampler, NestError> {
        Ok(match self {
            SamplerKind::CubeMH => AnySampler::CubeMH(CubeMHSampler::new(nsteps, max_rejects)?),
            SamplerKind::RegionMH => {
                AnySampler::RegionMH(RegionMHSampler::new(nsteps, max_rejects)?)
            }
            SamplerKind::CubeSlice => {
                AnySampler::CubeSlice(CubeSliceSampler::new(nsteps, max_rejects)?)
            }
            SamplerKind::RegionSlice => {
                AnySampler::RegionSlice(RegionSliceSampler::new(nsteps, max_rejects)?)
            }
            SamplerKind::RegionRejection => AnySampler::RegionRejection(RegionSampler::new()),
        })
    }
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SamplerKind {
    type Err = NestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SamplerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                NestError::InvalidConfig(format!(
                    "unknown sampler '{s}', expected one of cubemh, regionmh, cubeslice, regionslice, mlfriends"
                ))
            })
    }
}

/// A sampler of any kind, chosen at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum AnySampler {
    CubeMH(CubeMHSampler),
    RegionMH(RegionMHSampler),
    CubeSlice(CubeSliceSampler),
    RegionSlice(RegionSliceSampler),
    RegionRejection(RegionSampler),
}

impl AnySampler {
    pub fn kind(&self) -> SamplerKind {
        match self {
            AnySampler::CubeMH(_) => SamplerKind::CubeMH,
            AnySampler::RegionMH(_) => SamplerKind::RegionMH,
            AnySampler::CubeSlice(_) => SamplerKind::CubeSlice,
            AnySampler::RegionSlice(_) => SamplerKind::RegionSlice,
            AnySampler::RegionRejection(_) => SamplerKind::RegionRejection,
        }
    }

    /// The stepping strategy inside, if any.
    pub fn as_step_sampler(&self) -> Option<&dyn StepSampler> {
        match self {
            AnySampler::CubeMH(s) => Some(s),
            AnySampler::RegionMH(s) => Some(s),
            AnySampler::CubeSlice(s) => Some(s),
            AnySampler::RegionSlice(s) => Some(s),
            AnySampler::RegionRejection(_) => None,
        }
    }

    pub fn as_step_sampler_mut(&mut self) -> Option<&mut dyn StepSampler> {
        match self {
            AnySampler::CubeMH(s) => Some(s),
            AnySampler::RegionMH(s) => Some(s),
            AnySampler::CubeSlice(s) => Some(s),
            AnySampler::RegionSlice(s) => Some(s),
            AnySampler::RegionRejection(_) => None,
        }
    }
}

impl LivePointSampler for AnySampler {
    fn propose(
        &mut self,
        region: &dyn Region,
        lmin: f64,
        live: &LivePoints,
        problem: &dyn Problem,
        rng: &mut SmallRng,
    ) -> Result<Proposal, NestError> {
        match self {
            AnySampler::CubeMH(s) => s.propose(region, lmin, live, problem, rng),
            AnySampler::RegionMH(s) => s.propose(region, lmin, live, problem, rng),
            AnySampler::CubeSlice(s) => s.propose(region, lmin, live, problem, rng),
            AnySampler::RegionSlice(s) => s.propose(region, lmin, live, problem, rng),
            AnySampler::RegionRejection(s) => s.propose(region, lmin, live, problem, rng),
        }
    }

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Batch sizes below 1 would never produce a candidate.
pub(crate) fn check_ndraw(ndraw: usize) -> Result<usize, NestError> {
    if ndraw == 0 {
        return Err(NestError::InvalidConfig(
            "a sampler needs ndraw >= 1".to_string(),
        ));
    }
    Ok(ndraw)
}
