/*!
Bounding regions of the live points.

[`MLFriends`] covers the live points with equal balls in the whitened space of
a [`TransformLayer`], intersected with an enlarged bounding ellipsoid. The ball
radius and the ellipsoid enlargement are calibrated by bootstrapping: points
left out of a resample must still be covered by the remaining ones.

Regions are snapshots. A refresh builds a new [`MLFriends`] from a new layer;
only [`MLFriends::create_ellipsoid`] updates an existing region, and it swaps
the whole ellipsoid.

# Examples

```rust
use mini_nest::region::{MLFriends, Region};
use mini_nest::transform::{AffineLayer, TransformLayer};
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

let mut rng = SmallRng::seed_from_u64(1);
let points = Array2::from_shape_fn((100, 2), |_| rng.gen::<f64>());
let mut layer = AffineLayer::new(2);
layer.optimize(points.view(), points.view(), 1.0).unwrap();

let mut region = MLFriends::build(points.view(), layer, 30, &mut rng).unwrap();
region.create_ellipsoid(1.0).unwrap();
assert!(region.inside(points.view()).iter().all(|&inside| inside));
assert!(region.estimate_volume() > 0.0 && region.estimate_volume() <= 1.0);
```
*/

use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::distributions::Open01;
use rand::Rng;
use rand_distr::StandardNormal;
use std::fmt;

use crate::error::NestError;
use crate::stats::{mahalanobis_sq, mean_and_cov, spd_inverse, to_dmatrix, unit_ball_volume};
use crate::transform::{ScalingLayer, TransformLayer};

/// Candidates drawn from a region, one per row, with the index of the fitted
/// point each one was grown from (if the region has such points).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSample {
    pub points: Array2<f64>,
    pub fathers: Vec<Option<usize>>,
}

impl RegionSample {
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }
}

/// What samplers and the evolution loop need from a region.
pub trait Region: fmt::Debug {
    fn ndim(&self) -> usize;

    /// Membership of each row of `points`.
    fn inside(&self, points: ArrayView2<f64>) -> Vec<bool>;

    /// Draws up to `nsamples` candidates uniformly from the region. Rejection
    /// based, so fewer (possibly zero) candidates may come back.
    fn sample(&self, nsamples: usize, rng: &mut SmallRng) -> RegionSample;

    /// Volume estimate of the region. Not clipped to the cube, so sparse
    /// high-dimensional regions may report more than 1.
    fn estimate_volume(&self) -> f64;

    fn transform_layer(&self) -> &dyn TransformLayer;

    fn contains(&self, u: ArrayView1<f64>) -> bool {
        self.inside(u.insert_axis(Axis(0)))[0]
    }
}

/// `{x : (x - center)^T inv_cov (x - center) <= 1}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    pub center: Array1<f64>,
    pub cov: Array2<f64>,
    pub inv_cov: Array2<f64>,
    /// Semi-axis lengths, ascending.
    pub axes: Array1<f64>,
    pub volume: f64,
}

impl Ellipsoid {
    /// Ellipsoid with shape matrix `scale * cov`.
    fn new(center: Array1<f64>, cov: &Array2<f64>, scale: f64) -> Result<Self, NestError> {
        let n_dim = center.len();
        let shape = cov * scale;
        let inv_cov = spd_inverse(shape.view())?;
        let eigen = to_dmatrix(shape.view()).symmetric_eigen();
        let mut axes: Vec<f64> = eigen.eigenvalues.iter().map(|l| l.max(0.0).sqrt()).collect();
        axes.sort_by(f64::total_cmp);
        let volume = unit_ball_volume(n_dim) * axes.iter().product::<f64>();
        Ok(Self {
            center,
            cov: shape,
            inv_cov,
            axes: Array1::from(axes),
            volume,
        })
    }

    pub fn contains(&self, u: ArrayView1<f64>) -> bool {
        let delta = &u - &self.center;
        mahalanobis_sq(delta.view(), self.inv_cov.view()) <= 1.0
    }
}

/// Union of whitened balls around the fitted points, cut by an ellipsoid.
#[derive(Debug, Clone)]
pub struct MLFriends<L> {
    u: Array2<f64>,
    w: Array2<f64>,
    layer: L,
    max_radius_sq: f64,
    enlarge: f64,
    ellipsoid: Option<Ellipsoid>,
}

impl<L: TransformLayer> MLFriends<L> {
    /// Wraps `points` and a fitted layer. The region covers nothing until the
    /// enlargement is set.
    pub fn new(points: ArrayView2<f64>, layer: L) -> Self {
        let w = layer.transform(points);
        Self {
            u: points.to_owned(),
            w,
            layer,
            max_radius_sq: 0.0,
            enlarge: 0.0,
            ellipsoid: None,
        }
    }

    /// Creates the region and calibrates it with `n_bootstraps` resamples.
    pub fn build(
        points: ArrayView2<f64>,
        layer: L,
        n_bootstraps: usize,
        rng: &mut SmallRng,
    ) -> Result<Self, NestError> {
        let mut region = Self::new(points, layer);
        let (max_radius_sq, enlarge) = region.compute_enlargement(n_bootstraps, rng)?;
        region.set_enlargement(max_radius_sq, enlarge);
        Ok(region)
    }

    /// Bootstraps the ball radius and the ellipsoid enlargement.
    ///
    /// Each round resamples the points with replacement; the points never drawn
    /// are held out. Returns the largest squared whitened distance from a
    /// held-out point to its nearest selected point, and the largest squared
    /// Mahalanobis distance of a held-out point under the selected points'
    /// mean and covariance.
    pub fn compute_enlargement(
        &self,
        n_bootstraps: usize,
        rng: &mut SmallRng,
    ) -> Result<(f64, f64), NestError> {
        let n = self.u.nrows();
        let mut max_radius_sq: f64 = 0.0;
        let mut enlarge: f64 = 0.0;

        for _ in 0..n_bootstraps {
            let mut chosen = vec![false; n];
            for _ in 0..n {
                chosen[rng.gen_range(0..n)] = true;
            }
            let (selected, held_out): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| chosen[i]);
            if held_out.is_empty() {
                continue;
            }

            for &i in &held_out {
                let nearest = selected
                    .iter()
                    .map(|&j| sq_dist(self.w.row(i), self.w.row(j)))
                    .fold(f64::INFINITY, f64::min);
                max_radius_sq = max_radius_sq.max(nearest);
            }

            let Ok((mean, cov)) = mean_and_cov(self.u.select(Axis(0), &selected).view()) else {
                continue;
            };
            let Ok(inv_cov) = spd_inverse(cov.view()) else {
                continue;
            };
            for &i in &held_out {
                let delta = &self.u.row(i) - &mean;
                enlarge = enlarge.max(mahalanobis_sq(delta.view(), inv_cov.view()));
            }
        }

        if !(max_radius_sq.is_finite() && max_radius_sq > 0.0) {
            return Err(NestError::DegenerateGeometry(format!(
                "bootstrapped friends radius is {max_radius_sq}"
            )));
        }
        Ok((max_radius_sq, enlarge))
    }

    pub fn set_enlargement(&mut self, max_radius_sq: f64, enlarge: f64) {
        self.max_radius_sq = max_radius_sq;
        self.enlarge = enlarge;
    }

    /// Fits the bounding ellipsoid to the points.
    ///
    /// The covariance is scaled by the bootstrapped enlargement, or more if
    /// needed to contain every fitted point, then inflated until the volume
    /// reaches `minvol`.
    pub fn create_ellipsoid(&mut self, minvol: f64) -> Result<(), NestError> {
        let n_dim = self.ndim();
        let (mean, cov) = mean_and_cov(self.u.view())?;
        let inv_cov = spd_inverse(cov.view())?;
        let widest = self
            .u
            .rows()
            .into_iter()
            .map(|row| mahalanobis_sq((&row - &mean).view(), inv_cov.view()))
            .fold(0.0, f64::max);
        let mut scale = self.enlarge.max(widest);
        if scale <= 0.0 {
            scale = 1.0;
        }
        let mut ellipsoid = Ellipsoid::new(mean.clone(), &cov, scale)?;
        if ellipsoid.volume < minvol {
            scale *= (minvol / ellipsoid.volume).powf(2.0 / n_dim as f64);
            ellipsoid = Ellipsoid::new(mean, &cov, scale)?;
        }
        self.ellipsoid = Some(ellipsoid);
        Ok(())
    }

    pub fn ellipsoid(&self) -> Option<&Ellipsoid> {
        self.ellipsoid.as_ref()
    }

    pub fn max_radius_sq(&self) -> f64 {
        self.max_radius_sq
    }

    pub fn enlarge(&self) -> f64 {
        self.enlarge
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    /// The points the region was fitted on.
    pub fn points(&self) -> &Array2<f64> {
        &self.u
    }

    fn near_fitted_point(&self, w: ArrayView1<f64>) -> bool {
        self.w
            .rows()
            .into_iter()
            .any(|row| sq_dist(row, w) <= self.max_radius_sq)
    }

    fn in_ellipsoid(&self, u: ArrayView1<f64>) -> bool {
        self.ellipsoid.as_ref().map_or(true, |e| e.contains(u))
    }
}

impl<L: TransformLayer> Region for MLFriends<L> {
    fn ndim(&self) -> usize {
        self.u.ncols()
    }

    fn inside(&self, points: ArrayView2<f64>) -> Vec<bool> {
        let whitened = self.layer.transform(points);
        points
            .rows()
            .into_iter()
            .zip(whitened.rows())
            .map(|(u, w)| self.in_ellipsoid(u) && self.near_fitted_point(w))
            .collect()
    }

    fn sample(&self, nsamples: usize, rng: &mut SmallRng) -> RegionSample {
        let n_dim = self.ndim();
        let radius = self.max_radius_sq.sqrt();
        let mut whitened = Vec::with_capacity(nsamples * n_dim);
        let mut fathers = Vec::with_capacity(nsamples);

        for _ in 0..nsamples {
            let father = rng.gen_range(0..self.w.nrows());
            let w = &self.w.row(father) + &(sample_unit_ball(n_dim, rng) * radius);
            // Points covered by several balls would be over-represented.
            let n_nearby = self
                .w
                .rows()
                .into_iter()
                .filter(|row| sq_dist(*row, w.view()) <= self.max_radius_sq)
                .count()
                .max(1);
            if rng.gen::<f64>() * (n_nearby as f64) < 1.0 {
                whitened.extend(w.iter());
                fathers.push(father);
            }
        }

        let whitened = Array2::from_shape_vec((fathers.len(), n_dim), whitened)
            .unwrap_or_else(|_| Array2::zeros((0, n_dim)));
        let candidates = self.layer.untransform(whitened.view());
        let keep: Vec<usize> = candidates
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, u)| in_open_cube(*u) && self.in_ellipsoid(*u))
            .map(|(i, _)| i)
            .collect();

        RegionSample {
            points: candidates.select(Axis(0), &keep),
            fathers: keep.iter().map(|&i| Some(fathers[i])).collect(),
        }
    }

    fn estimate_volume(&self) -> f64 {
        let n_dim = self.ndim();
        let ball = unit_ball_volume(n_dim) * self.max_radius_sq.powf(n_dim as f64 / 2.0);
        self.layer.volscale() * ball
    }

    fn transform_layer(&self) -> &dyn TransformLayer {
        &self.layer
    }
}

/// The whole unit cube.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCube {
    layer: ScalingLayer,
}

impl UnitCube {
    pub fn new(n_dim: usize) -> Self {
        Self {
            layer: ScalingLayer::new(n_dim),
        }
    }
}

impl Region for UnitCube {
    fn ndim(&self) -> usize {
        self.layer.ndim()
    }

    fn inside(&self, points: ArrayView2<f64>) -> Vec<bool> {
        points.rows().into_iter().map(in_open_cube).collect()
    }

    fn sample(&self, nsamples: usize, rng: &mut SmallRng) -> RegionSample {
        let points =
            Array2::from_shape_simple_fn((nsamples, self.ndim()), || rng.sample::<f64, _>(Open01));
        RegionSample {
            points,
            fathers: vec![None; nsamples],
        }
    }

    fn estimate_volume(&self) -> f64 {
        1.0
    }

    fn transform_layer(&self) -> &dyn TransformLayer {
        &self.layer
    }
}

/// Strictly inside `(0, 1)` along every axis.
pub fn in_open_cube(u: ArrayView1<f64>) -> bool {
    u.iter().all(|&x| x > 0.0 && x < 1.0)
}

fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Uniform draw from the unit ball.
pub(crate) fn sample_unit_ball(n_dim: usize, rng: &mut SmallRng) -> Array1<f64> {
    let direction = sample_direction(n_dim, rng);
    let radius = rng.gen::<f64>().powf(1.0 / n_dim as f64);
    direction * radius
}

/// Uniform draw from the unit sphere.
pub(crate) fn sample_direction(n_dim: usize, rng: &mut SmallRng) -> Array1<f64> {
    loop {
        let v = Array1::from_shape_simple_fn(n_dim, || rng.sample::<f64, _>(StandardNormal));
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            return v / norm;
        }
    }
}
