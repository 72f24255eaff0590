//! Direct rejection sampling from the region.

use rand::rngs::SmallRng;

use crate::core::{evaluate, LivePoints};
use crate::distributions::Problem;
use crate::error::NestError;
use crate::region::Region;
use crate::sampler::{check_ndraw, Draw, LivePointSampler, Proposal};

/// Candidates requested from the region per call.
pub const DEFAULT_NDRAW: usize = 40;

/// Draws a batch from the region and evaluates its first candidate.
///
/// No adaptation: every call is independent. A call costs one likelihood
/// evaluation, or none when the region returned no candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSampler {
    ndraw: usize,
    last_father: Option<usize>,
}

impl Default for RegionSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionSampler {
    pub fn new() -> Self {
        Self {
            ndraw: DEFAULT_NDRAW,
            last_father: None,
        }
    }

    /// Candidates requested from the region per call, at least 1.
    pub fn set_ndraw(mut self, ndraw: usize) -> Result<Self, NestError> {
        self.ndraw = check_ndraw(ndraw)?;
        Ok(self)
    }

    pub fn ndraw(&self) -> usize {
        self.ndraw
    }

    /// Live point the last evaluated candidate was grown from.
    pub fn last_father(&self) -> Option<usize> {
        self.last_father
    }
}

impl LivePointSampler for RegionSampler {
    fn propose(
        &mut self,
        region: &dyn Region,
        lmin: f64,
        _live: &LivePoints,
        problem: &dyn Problem,
        rng: &mut SmallRng,
    ) -> Result<Proposal, NestError> {
        let sample = region.sample(self.ndraw, rng);
        if sample.is_empty() {
            return Ok(Proposal::failed(0));
        }
        self.last_father = sample.fathers.first().copied().flatten();
        let u = sample.points.row(0).to_owned();
        let (v, logl) = evaluate(problem, u.view())?;
        if logl > lmin {
            Ok(Proposal::accepted(Draw { u, v, logl }, 1))
        } else {
            Ok(Proposal::failed(1))
        }
    }

    fn name(&self) -> &'static str {
        "mlfriends"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{CircGauss, FnProblem};
    use crate::region::{RegionSample, UnitCube};
    use crate::transform::TransformLayer;
    use ndarray::prelude::*;
    use rand::SeedableRng;

    #[derive(Debug)]
    struct Barren(UnitCube);

    impl Region for Barren {
        fn ndim(&self) -> usize {
            self.0.ndim()
        }
        fn inside(&self, points: ArrayView2<f64>) -> Vec<bool> {
            vec![false; points.nrows()]
        }
        fn sample(&self, _nsamples: usize, _rng: &mut SmallRng) -> RegionSample {
            RegionSample {
                points: Array2::zeros((0, self.ndim())),
                fathers: Vec::new(),
            }
        }
        fn estimate_volume(&self) -> f64 {
            0.0
        }
        fn transform_layer(&self) -> &dyn TransformLayer {
            self.0.transform_layer()
        }
    }

    /// Candidates without any record of where they were grown from.
    #[derive(Debug)]
    struct Orphans(UnitCube);

    impl Region for Orphans {
        fn ndim(&self) -> usize {
            self.0.ndim()
        }
        fn inside(&self, points: ArrayView2<f64>) -> Vec<bool> {
            self.0.inside(points)
        }
        fn sample(&self, nsamples: usize, rng: &mut SmallRng) -> RegionSample {
            RegionSample {
                fathers: Vec::new(),
                ..self.0.sample(nsamples, rng)
            }
        }
        fn estimate_volume(&self) -> f64 {
            1.0
        }
        fn transform_layer(&self) -> &dyn TransformLayer {
            self.0.transform_layer()
        }
    }

    fn live_points(rng: &mut SmallRng) -> (CircGauss, LivePoints) {
        let problem = CircGauss::new(2, 0.1);
        let live = LivePoints::uniform(10, 2, &problem, rng).unwrap();
        (problem, live)
    }

    #[test]
    fn empty_region_sample_costs_nothing() {
        let mut rng = SmallRng::seed_from_u64(1);
        let (problem, live) = live_points(&mut rng);
        let mut sampler = RegionSampler::new();
        for _ in 0..10 {
            let proposal = sampler
                .propose(&Barren(UnitCube::new(2)), f64::NEG_INFINITY, &live, &problem, &mut rng)
                .unwrap();
            assert_eq!(proposal, Proposal::failed(0));
        }
    }

    #[test]
    fn full_cube_accepts_first_candidate() {
        let mut rng = SmallRng::seed_from_u64(2);
        let (problem, live) = live_points(&mut rng);
        let mut sampler = RegionSampler::new();
        for _ in 0..20 {
            let proposal = sampler
                .propose(&UnitCube::new(2), f64::NEG_INFINITY, &live, &problem, &mut rng)
                .unwrap();
            assert_eq!(proposal.ncalls, 1);
            assert!(proposal.draw.is_some());
        }
        assert_eq!(sampler.last_father(), None);
    }

    #[test]
    fn threshold_is_strict() {
        let mut rng = SmallRng::seed_from_u64(3);
        let flat = FnProblem::new(|_: &[f64]| 0.0, |u: &[f64]| u.to_vec());
        let live = LivePoints::uniform(5, 2, &flat, &mut rng).unwrap();
        let mut sampler = RegionSampler::new().set_ndraw(1).unwrap();
        let proposal = sampler
            .propose(&UnitCube::new(2), 0.0, &live, &flat, &mut rng)
            .unwrap();
        assert_eq!(proposal, Proposal::failed(1));
    }

    #[test]
    fn zero_ndraw_is_rejected() {
        assert!(matches!(
            RegionSampler::new().set_ndraw(0),
            Err(NestError::InvalidConfig(_))
        ));
        assert_eq!(RegionSampler::new().set_ndraw(3).unwrap().ndraw(), 3);
        assert_eq!(RegionSampler::new().ndraw(), DEFAULT_NDRAW);
    }

    #[test]
    fn candidates_without_fathers_are_evaluated() {
        let mut rng = SmallRng::seed_from_u64(4);
        let (problem, live) = live_points(&mut rng);
        let mut sampler = RegionSampler::new();
        let proposal = sampler
            .propose(&Orphans(UnitCube::new(2)), f64::NEG_INFINITY, &live, &problem, &mut rng)
            .unwrap();
        assert_eq!(proposal.ncalls, 1);
        assert!(proposal.draw.is_some());
        assert_eq!(sampler.last_father(), None);
    }
}
