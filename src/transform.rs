/*!
Coordinate changes applied before a region is fitted.

A [`TransformLayer`] maps unit-cube points into a whitened space in which the
live points look roughly isotropic, so that the friends balls of
[`crate::region::MLFriends`] can be spheres. Two layers are provided:

- [`ScalingLayer`]: per-axis centring and scaling.
- [`AffineLayer`]: centring plus full covariance whitening.

Layers are never refitted in place during a run: [`TransformLayer::create_new`]
always returns a fresh layer, which becomes part of a fresh region.
*/

use nalgebra as na;
use ndarray::prelude::*;
use std::fmt;
use tracing::debug;

use crate::error::NestError;
use crate::stats::{mean_and_cov, to_dmatrix};

/// Standard deviation of U(0, 1). A population filling the whole cube has a
/// volume scale of `UNIFORM_STD^d`.
const UNIFORM_STD: f64 = 0.288_675_134_594_812_9;

pub trait TransformLayer: fmt::Debug {
    fn ndim(&self) -> usize;

    /// Fits the layer: location from `points`, shape from `centered_points`.
    ///
    /// If the fitted volume scale ends up below `minvol` times that of a
    /// population covering the whole cube, the scale is inflated isotropically
    /// up to that floor. On error the layer is left unchanged.
    fn optimize(
        &mut self,
        points: ArrayView2<f64>,
        centered_points: ArrayView2<f64>,
        minvol: f64,
    ) -> Result<(), NestError>;

    /// Cube coordinates to whitened coordinates, one point per row.
    fn transform(&self, points: ArrayView2<f64>) -> Array2<f64>;

    /// Whitened coordinates back to cube coordinates, one point per row.
    fn untransform(&self, points: ArrayView2<f64>) -> Array2<f64>;

    /// Cube-space volume of one unit of whitened volume.
    fn volscale(&self) -> f64;

    /// A new layer of the same kind fitted on `points`, which are grouped into
    /// clusters of friends linked within `sqrt(max_radius_sq)` in this layer's
    /// whitened space.
    fn create_new(
        &self,
        points: ArrayView2<f64>,
        max_radius_sq: f64,
        minvol: f64,
    ) -> Result<Self, NestError>
    where
        Self: Sized;

    fn transform_point(&self, u: ArrayView1<f64>) -> Array1<f64> {
        self.transform(u.insert_axis(Axis(0))).row(0).to_owned()
    }

    fn untransform_point(&self, w: ArrayView1<f64>) -> Array1<f64> {
        self.untransform(w.insert_axis(Axis(0))).row(0).to_owned()
    }
}

/// Isotropic inflation factor that lifts `volscale` to the `minvol` floor.
fn minvol_inflation(volscale: f64, minvol: f64, n_dim: usize) -> f64 {
    let floor = minvol * UNIFORM_STD.powi(n_dim as i32);
    if volscale < floor {
        (floor / volscale).powf(1.0 / n_dim as f64)
    } else {
        1.0
    }
}

/// Per-axis location and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingLayer {
    mean: Array1<f64>,
    std: Array1<f64>,
    volscale: f64,
}

impl ScalingLayer {
    /// The identity transform; call [`TransformLayer::optimize`] to fit it.
    pub fn new(n_dim: usize) -> Self {
        Self {
            mean: Array1::zeros(n_dim),
            std: Array1::ones(n_dim),
            volscale: 1.0,
        }
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }
}

impl TransformLayer for ScalingLayer {
    fn ndim(&self) -> usize {
        self.mean.len()
    }

    fn optimize(
        &mut self,
        points: ArrayView2<f64>,
        centered_points: ArrayView2<f64>,
        minvol: f64,
    ) -> Result<(), NestError> {
        let mean = points
            .mean_axis(Axis(0))
            .ok_or_else(|| NestError::DegenerateGeometry("no points to fit".to_string()))?;
        let mut std = centered_points.std_axis(Axis(0), 0.0);
        if !std.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(NestError::DegenerateGeometry(format!(
                "scaling layer has a non-positive axis scale: {std}"
            )));
        }
        let mut volscale = std.product();
        let factor = minvol_inflation(volscale, minvol, mean.len());
        if factor > 1.0 {
            std *= factor;
            volscale *= factor.powi(mean.len() as i32);
        }
        self.mean = mean;
        self.std = std;
        self.volscale = volscale;
        Ok(())
    }

    fn transform(&self, points: ArrayView2<f64>) -> Array2<f64> {
        (&points - &self.mean) / &self.std
    }

    fn untransform(&self, points: ArrayView2<f64>) -> Array2<f64> {
        &points * &self.std + &self.mean
    }

    fn volscale(&self) -> f64 {
        self.volscale
    }

    fn create_new(
        &self,
        points: ArrayView2<f64>,
        max_radius_sq: f64,
        minvol: f64,
    ) -> Result<Self, NestError> {
        refit(self, ScalingLayer::new(self.ndim()), points, max_radius_sq, minvol)
    }
}

/// Location plus covariance whitening: `w = (u - ctr) · whiten`.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineLayer {
    ctr: Array1<f64>,
    whiten: Array2<f64>,
    unwhiten: Array2<f64>,
    volscale: f64,
}

impl AffineLayer {
    /// The identity transform; call [`TransformLayer::optimize`] to fit it.
    pub fn new(n_dim: usize) -> Self {
        Self {
            ctr: Array1::zeros(n_dim),
            whiten: Array2::eye(n_dim),
            unwhiten: Array2::eye(n_dim),
            volscale: 1.0,
        }
    }

    pub fn center(&self) -> &Array1<f64> {
        &self.ctr
    }
}

impl TransformLayer for AffineLayer {
    fn ndim(&self) -> usize {
        self.ctr.len()
    }

    fn optimize(
        &mut self,
        points: ArrayView2<f64>,
        centered_points: ArrayView2<f64>,
        minvol: f64,
    ) -> Result<(), NestError> {
        let n_dim = self.ndim();
        let ctr = points
            .mean_axis(Axis(0))
            .ok_or_else(|| NestError::DegenerateGeometry("no points to fit".to_string()))?;
        let (_, cov) = mean_and_cov(centered_points)?;
        let eigen = na::SymmetricEigen::new(to_dmatrix(cov.view()));
        if !eigen.eigenvalues.iter().all(|l| l.is_finite() && *l > 0.0) {
            return Err(NestError::DegenerateGeometry(format!(
                "covariance is not positive definite, eigenvalues {:?}",
                eigen.eigenvalues.as_slice()
            )));
        }
        let mut axis_std: Vec<f64> = eigen.eigenvalues.iter().map(|l| l.sqrt()).collect();
        let mut volscale: f64 = axis_std.iter().product();
        let factor = minvol_inflation(volscale, minvol, n_dim);
        if factor > 1.0 {
            axis_std.iter_mut().for_each(|s| *s *= factor);
            volscale *= factor.powi(n_dim as i32);
        }

        let vecs = &eigen.eigenvectors;
        self.whiten = Array2::from_shape_fn((n_dim, n_dim), |(i, k)| vecs[(i, k)] / axis_std[k]);
        self.unwhiten = Array2::from_shape_fn((n_dim, n_dim), |(k, i)| vecs[(i, k)] * axis_std[k]);
        self.ctr = ctr;
        self.volscale = volscale;
        Ok(())
    }

    fn transform(&self, points: ArrayView2<f64>) -> Array2<f64> {
        (&points - &self.ctr).dot(&self.whiten)
    }

    fn untransform(&self, points: ArrayView2<f64>) -> Array2<f64> {
        points.dot(&self.unwhiten) + &self.ctr
    }

    fn volscale(&self) -> f64 {
        self.volscale
    }

    fn create_new(
        &self,
        points: ArrayView2<f64>,
        max_radius_sq: f64,
        minvol: f64,
    ) -> Result<Self, NestError> {
        refit(self, AffineLayer::new(self.ndim()), points, max_radius_sq, minvol)
    }
}

/// A layer whose kind is chosen at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Scaling(ScalingLayer),
    Affine(AffineLayer),
}

impl From<ScalingLayer> for Layer {
    fn from(layer: ScalingLayer) -> Self {
        Layer::Scaling(layer)
    }
}

impl From<AffineLayer> for Layer {
    fn from(layer: AffineLayer) -> Self {
        Layer::Affine(layer)
    }
}

impl TransformLayer for Layer {
    fn ndim(&self) -> usize {
        match self {
            Layer::Scaling(l) => l.ndim(),
            Layer::Affine(l) => l.ndim(),
        }
    }

    fn optimize(
        &mut self,
        points: ArrayView2<f64>,
        centered_points: ArrayView2<f64>,
        minvol: f64,
    ) -> Result<(), NestError> {
        match self {
            Layer::Scaling(l) => l.optimize(points, centered_points, minvol),
            Layer::Affine(l) => l.optimize(points, centered_points, minvol),
        }
    }

    fn transform(&self, points: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Layer::Scaling(l) => l.transform(points),
            Layer::Affine(l) => l.transform(points),
        }
    }

    fn untransform(&self, points: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Layer::Scaling(l) => l.untransform(points),
            Layer::Affine(l) => l.untransform(points),
        }
    }

    fn volscale(&self) -> f64 {
        match self {
            Layer::Scaling(l) => l.volscale(),
            Layer::Affine(l) => l.volscale(),
        }
    }

    fn create_new(
        &self,
        points: ArrayView2<f64>,
        max_radius_sq: f64,
        minvol: f64,
    ) -> Result<Self, NestError> {
        Ok(match self {
            Layer::Scaling(l) => Layer::Scaling(l.create_new(points, max_radius_sq, minvol)?),
            Layer::Affine(l) => Layer::Affine(l.create_new(points, max_radius_sq, minvol)?),
        })
    }
}

/// Shared body of `create_new`: cluster in the current space, then fit the
/// fresh layer on cluster-centred points (or on the raw points if that fit is
/// degenerate).
fn refit<L: TransformLayer>(
    current: &L,
    mut next: L,
    points: ArrayView2<f64>,
    max_radius_sq: f64,
    minvol: f64,
) -> Result<L, NestError> {
    let labels = friends_of_friends(current.transform(points).view(), max_radius_sq);
    let n_clusters = labels.iter().copied().max().map_or(0, |m| m + 1);
    let centered = center_on_clusters(points, &labels, n_clusters);
    match next.optimize(points, centered.view(), minvol) {
        Ok(()) => Ok(next),
        Err(NestError::DegenerateGeometry(reason)) if n_clusters > 1 => {
            debug!(n_clusters, %reason, "cluster-centred fit degenerate, refitting on raw points");
            next.optimize(points, points, minvol)?;
            Ok(next)
        }
        Err(e) => Err(e),
    }
}

/// Labels each row with its friends-of-friends cluster: two points are
/// friends when their squared distance is at most `max_radius_sq`. Labels are
/// numbered in order of first appearance.
pub fn friends_of_friends(points: ArrayView2<f64>, max_radius_sq: f64) -> Vec<usize> {
    let n = points.nrows();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let d2: f64 = points
                .row(i)
                .iter()
                .zip(points.row(j).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            if d2 <= max_radius_sq {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj.max(ri)] = rj.min(ri);
                }
            }
        }
    }

    let mut labels = vec![0; n];
    let mut root_label: Vec<Option<usize>> = vec![None; n];
    let mut next_label = 0;
    for (i, label) in labels.iter_mut().enumerate() {
        let root = find(&mut parent, i);
        *label = *root_label[root].get_or_insert_with(|| {
            next_label += 1;
            next_label - 1
        });
    }
    labels
}

/// Subtracts from each row the mean of its cluster.
fn center_on_clusters(points: ArrayView2<f64>, labels: &[usize], n_clusters: usize) -> Array2<f64> {
    let n_dim = points.ncols();
    let mut sums = Array2::<f64>::zeros((n_clusters, n_dim));
    let mut counts = vec![0usize; n_clusters];
    for (row, &label) in points.rows().into_iter().zip(labels) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }
    let mut centered = points.to_owned();
    for (mut row, &label) in centered.rows_mut().into_iter().zip(labels) {
        let mean = &sums.row(label) / counts[label] as f64;
        row -= &mean;
    }
    centered
}
