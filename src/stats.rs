//! Provides the small statistics and linear algebra helpers shared by the
//! transform layers, the region and the samplers.

use nalgebra as na;
use ndarray::prelude::*;
use ndarray_stats::CorrelationExt;
use std::collections::VecDeque;

use crate::error::NestError;

/// Number of recent outcomes kept for the rolling acceptance rate.
const ACCEPT_WINDOW: usize = 100;

/// Running acceptance statistics of a step sampler: lifetime counts plus the
/// acceptance rate over the most recent outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceStats {
    n_accepted: u64,
    n_rejected: u64,
    p_accept: f64,
    accept_queue: VecDeque<bool>,
}

impl Default for AcceptanceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceptanceStats {
    pub fn new() -> Self {
        Self {
            n_accepted: 0,
            n_rejected: 0,
            p_accept: 0.0,
            accept_queue: VecDeque::with_capacity(ACCEPT_WINDOW + 1),
        }
    }

    pub fn record(&mut self, accepted: bool) {
        if accepted {
            self.n_accepted += 1;
        } else {
            self.n_rejected += 1;
        }
        let old_len = self.accept_queue.len() as f64;
        self.accept_queue.push_back(accepted);
        let removed = if self.accept_queue.len() > ACCEPT_WINDOW {
            self.accept_queue.pop_front().unwrap_or(false)
        } else {
            false
        };
        let new_len = self.accept_queue.len() as f64;
        self.p_accept = (self.p_accept * old_len + f64::from(u8::from(accepted))
            - f64::from(u8::from(removed)))
            / new_len;
    }

    /// Acceptance rate over the last outcomes (at most 100).
    pub fn recent_rate(&self) -> f64 {
        self.p_accept
    }

    pub fn n_accepted(&self) -> u64 {
        self.n_accepted
    }

    pub fn n_rejected(&self) -> u64 {
        self.n_rejected
    }

    /// Acceptance rate over the whole lifetime, zero before any outcome.
    pub fn overall_rate(&self) -> f64 {
        let total = self.n_accepted + self.n_rejected;
        if total == 0 {
            0.0
        } else {
            self.n_accepted as f64 / total as f64
        }
    }
}

/// Column means and sample covariance (ddof = 1) of a point set with one
/// point per row.
pub fn mean_and_cov(points: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>), NestError> {
    if points.nrows() < 2 {
        return Err(NestError::DegenerateGeometry(format!(
            "a covariance needs at least two points, got {}",
            points.nrows()
        )));
    }
    let mean = points
        .mean_axis(Axis(0))
        .ok_or_else(|| NestError::DegenerateGeometry("empty point set".to_string()))?;
    let cov = points
        .t()
        .cov(1.0)
        .map_err(|e| NestError::DegenerateGeometry(e.to_string()))?;
    Ok((mean, cov))
}

pub fn to_dmatrix(a: ArrayView2<f64>) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub fn from_dmatrix(m: &na::DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Inverse of a symmetric positive-definite matrix, via Cholesky.
pub fn spd_inverse(a: ArrayView2<f64>) -> Result<Array2<f64>, NestError> {
    let chol = to_dmatrix(a).cholesky().ok_or_else(|| {
        NestError::DegenerateGeometry("covariance is not positive definite".to_string())
    })?;
    Ok(from_dmatrix(&chol.inverse()))
}

/// Squared Mahalanobis distance `delta^T inv_cov delta`.
pub fn mahalanobis_sq(delta: ArrayView1<f64>, inv_cov: ArrayView2<f64>) -> f64 {
    delta.dot(&inv_cov.dot(&delta))
}

/// Volume of the unit ball in `n_dim` dimensions.
pub fn unit_ball_volume(n_dim: usize) -> f64 {
    // V_d = 2 pi / d * V_{d-2}, with V_0 = 1 and V_1 = 2.
    let mut volume = if n_dim % 2 == 0 { 1.0 } else { 2.0 };
    let mut d = if n_dim % 2 == 0 { 2 } else { 3 };
    while d <= n_dim {
        volume *= 2.0 * std::f64::consts::PI / d as f64;
        d += 2;
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_unit_ball_volume() {
        assert_abs_diff_eq!(unit_ball_volume(0), 1.0);
        assert_abs_diff_eq!(unit_ball_volume(1), 2.0);
        assert_abs_diff_eq!(unit_ball_volume(2), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(unit_ball_volume(3), 4.0 / 3.0 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(unit_ball_volume(4), PI * PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_and_cov() {
        let points = arr2(&[[0.0, 1.0], [1.0, 2.0], [2.0, 0.0]]);
        let (mean, cov) = mean_and_cov(points.view()).unwrap();
        assert_abs_diff_eq!(mean, arr1(&[1.0, 1.0]), epsilon = 1e-12);
        assert_abs_diff_eq!(cov, arr2(&[[1.0, -0.5], [-0.5, 1.0]]), epsilon = 1e-12);
    }

    #[test]
    fn test_mean_and_cov_needs_two_points() {
        let points = arr2(&[[0.5, 0.5]]);
        assert!(matches!(
            mean_and_cov(points.view()),
            Err(NestError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_spd_inverse_and_mahalanobis() {
        let cov = arr2(&[[4.0, 0.0], [0.0, 0.25]]);
        let inv = spd_inverse(cov.view()).unwrap();
        assert_abs_diff_eq!(inv, arr2(&[[0.25, 0.0], [0.0, 4.0]]), epsilon = 1e-12);
        let d2 = mahalanobis_sq(arr1(&[2.0, 0.5]).view(), inv.view());
        assert_abs_diff_eq!(d2, 2.0, epsilon = 1e-12);

        let singular = arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        assert!(spd_inverse(singular.view()).is_err());
    }

    #[test]
    fn test_dmatrix_conversion_keeps_layout() {
        let a = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let m = to_dmatrix(a.view());
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(from_dmatrix(&m), a);
    }

    #[test]
    fn test_acceptance_window() {
        let mut stats = AcceptanceStats::new();
        assert_eq!(stats.overall_rate(), 0.0);
        for i in 0..50 {
            stats.record(i % 2 == 0);
        }
        assert_abs_diff_eq!(stats.recent_rate(), 0.5, epsilon = 1e-12);
        // Fill the window with rejections only: the recent rate forgets the past.
        for _ in 0..100 {
            stats.record(false);
        }
        assert_abs_diff_eq!(stats.recent_rate(), 0.0, epsilon = 1e-9);
        assert_eq!(stats.n_accepted(), 25);
        assert_eq!(stats.n_rejected(), 125);
        assert_abs_diff_eq!(stats.overall_rate(), 25.0 / 150.0, epsilon = 1e-12);
    }
}
