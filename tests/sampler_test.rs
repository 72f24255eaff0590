//! Tests of the replacement samplers outside the evolution loop: the direct
//! sampler's contract on degenerate regions, uniformity of cube draws, and
//! the event trace of a step-sampler walk.

use mini_nest::core::LivePoints;
use mini_nest::distributions::{CircGauss, FnProblem};
use mini_nest::ks_test::uniform_ks_test;
use mini_nest::region::{Region, RegionSample, UnitCube};
use mini_nest::rejection::RegionSampler;
use mini_nest::sampler::{LivePointSampler, Proposal};
use mini_nest::stepsampler::{
    explore_steps, CubeMHSampler, CubeSliceSampler, StepEvent, StepSampler, StepTrace,
};
use mini_nest::transform::{ScalingLayer, TransformLayer};
use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// A region that contains nothing and never yields a candidate.
#[derive(Debug)]
struct Nowhere {
    layer: ScalingLayer,
}

impl Region for Nowhere {
    fn ndim(&self) -> usize {
        self.layer.ndim()
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
        &self.layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL: f64 = 0.001;

    fn flat_problem() -> FnProblem<impl Fn(&[f64]) -> f64, impl Fn(&[f64]) -> Vec<f64>> {
        FnProblem::new(|_: &[f64]| 0.0, |u: &[f64]| u.to_vec())
    }

    #[test]
    fn direct_sampler_reports_failure_on_empty_sample() {
        let mut rng = SmallRng::seed_from_u64(1);
        let problem = CircGauss::new(3, 0.1);
        let live = LivePoints::uniform(10, 3, &problem, &mut rng).unwrap();
        let region = Nowhere {
            layer: ScalingLayer::new(3),
        };
        let mut sampler = RegionSampler::new();
        for lmin in [f64::NEG_INFINITY, -10.0, 0.0] {
            let proposal = sampler
                .propose(&region, lmin, &live, &problem, &mut rng)
                .unwrap();
            assert_eq!(proposal, Proposal::failed(0));
        }
    }

    #[test]
    fn direct_sampler_accepts_first_draw_from_full_cube() {
        for seed in 0..20 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let problem = CircGauss::new(2, 0.1);
            let live = LivePoints::uniform(10, 2, &problem, &mut rng).unwrap();
            let proposal = RegionSampler::new()
                .propose(&UnitCube::new(2), f64::NEG_INFINITY, &live, &problem, &mut rng)
                .unwrap();
            assert_eq!(proposal.ncalls, 1);
            let draw = proposal.draw.expect("first proposal accepted");
            assert!(draw.logl > f64::NEG_INFINITY);
            assert_eq!(draw.v, draw.u.to_vec());
        }
    }

    #[test]
    fn initial_live_points_are_uniform() {
        let mut rng = SmallRng::seed_from_u64(42);
        let live = LivePoints::uniform(2000, 3, &flat_problem(), &mut rng).unwrap();
        for column in live.u().columns() {
            let mut sample = column.to_vec();
            let result = uniform_ks_test(&mut sample, LEVEL).unwrap();
            assert!(!result.is_rejected, "{result:?}");
        }
    }

    #[test]
    fn unit_cube_draws_are_uniform() {
        let mut rng = SmallRng::seed_from_u64(43);
        let sample = UnitCube::new(2).sample(2000, &mut rng);
        assert_eq!(sample.len(), 2000);
        assert!(sample.fathers.iter().all(Option::is_none));
        for column in sample.points.columns() {
            let mut values = column.to_vec();
            let result = uniform_ks_test(&mut values, LEVEL).unwrap();
            assert!(!result.is_rejected, "{result:?}");
        }
    }

    #[test]
    fn concentrated_live_points_are_not_uniform() {
        let mut rng = SmallRng::seed_from_u64(44);
        let problem = CircGauss::new(2, 0.02);
        let mut live = LivePoints::uniform(200, 2, &problem, &mut rng).unwrap();
        let mut sampler = RegionSampler::new();
        for _ in 0..2000 {
            let (worst, lmin) = live.worst();
            if let Some(draw) = sampler
                .propose(&UnitCube::new(2), lmin, &live, &problem, &mut rng)
                .unwrap()
                .draw
            {
                live.replace(worst, draw.u.view(), draw.logl);
            }
        }
        let mut sample = live.u().column(0).to_vec();
        let result = uniform_ks_test(&mut sample, LEVEL).unwrap();
        assert!(result.is_rejected, "{result:?}");
    }

    fn check_trace(trace: &StepTrace, start: ArrayView1<f64>, lmin: f64, path_len: usize) {
        match trace.events.first() {
            Some(StepEvent::Start { u }) => assert_eq!(u.view(), start),
            other => panic!("trace starts with {other:?}"),
        }
        assert_eq!(trace.accepted_points().len(), path_len);

        let mut current = start.to_owned();
        for event in &trace.events {
            if let StepEvent::Accepted { from, u, logl } = event {
                assert_eq!(from, &current);
                assert!(*logl >= lmin);
                current = u.clone();
            }
        }
    }

    #[test]
    fn mh_exploration_trace() {
        let mut rng = SmallRng::seed_from_u64(5);
        let problem = CircGauss::new(2, 0.2);
        let live = LivePoints::uniform(30, 2, &problem, &mut rng).unwrap();
        let (_, lmin) = live.worst();
        let start = live.point(0).to_owned();

        let mut sampler = CubeMHSampler::new(5, 100).unwrap();
        let mut trace = StepTrace::new();
        let exploration = explore_steps(
            &mut sampler,
            &UnitCube::new(2),
            start.view(),
            &live,
            &problem,
            8,
            100_000,
            &mut rng,
            &mut trace,
        )
        .unwrap();

        assert_eq!(exploration.path.len(), 8);
        check_trace(&trace, start.view(), lmin, 8);
        let accepted: Vec<&Array1<f64>> = exploration.path.iter().map(|d| &d.u).collect();
        assert_eq!(accepted, trace.accepted_points());

        let proposed = trace
            .events
            .iter()
            .filter(|e| matches!(e, StepEvent::Proposed { .. }))
            .count();
        assert_eq!(proposed, exploration.attempts);
        // Each attempt either found nothing inside or cost one call that
        // ended as a move or a rejection.
        assert_eq!(exploration.ncalls, exploration.attempts - trace.n_outside());
        assert_eq!(exploration.ncalls, 8 + trace.n_rejected());
        assert_eq!(sampler.walk().moves(), 8);
    }

    #[test]
    fn slice_exploration_trace_brackets_every_move() {
        let mut rng = SmallRng::seed_from_u64(6);
        let problem = CircGauss::new(3, 0.2);
        let live = LivePoints::uniform(30, 3, &problem, &mut rng).unwrap();
        let (_, lmin) = live.worst();
        let start = live.point(3).to_owned();

        let mut sampler = CubeSliceSampler::new(4, 100).unwrap();
        let mut trace = StepTrace::new();
        let exploration = explore_steps(
            &mut sampler,
            &UnitCube::new(3),
            start.view(),
            &live,
            &problem,
            6,
            100_000,
            &mut rng,
            &mut trace,
        )
        .unwrap();

        assert_eq!(exploration.path.len(), 6);
        check_trace(&trace, start.view(), lmin, 6);
        let brackets = trace
            .events
            .iter()
            .filter(|e| matches!(e, StepEvent::SliceBracket { .. }))
            .count();
        assert!(brackets >= 6, "{brackets} brackets for 6 moves");
        for event in &trace.events {
            if let StepEvent::SliceBracket { left, right } = event {
                assert_eq!(left.len(), 3);
                assert_eq!(right.len(), 3);
            }
        }
    }

    #[test]
    fn exploration_stalls_without_room_to_move() {
        let mut rng = SmallRng::seed_from_u64(7);
        let problem = flat_problem();
        let live = LivePoints::uniform(10, 2, &problem, &mut rng).unwrap();
        let start = live.point(0).to_owned();
        let region = Nowhere {
            layer: ScalingLayer::new(2),
        };
        let mut sampler = CubeMHSampler::new(1, 5).unwrap();
        let mut trace = StepTrace::new();
        let err = explore_steps(
            &mut sampler,
            &region,
            start.view(),
            &live,
            &problem,
            1,
            50,
            &mut rng,
            &mut trace,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            mini_nest::error::NestError::Stalled { attempts: 50, .. }
        ));
        assert_eq!(trace.n_outside(), 50);
    }
}
