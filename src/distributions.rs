/*!
Problems are what the live points explore: a log-likelihood over physical
parameters, plus the map from unit-cube coordinates into those parameters.

The crate treats both functions as opaque. The optional [`Problem::volume`]
diagnostic reports the volume of the region above a likelihood threshold; the
default stopping rule only uses it to decide which iterations count as "good".

# Examples

```rust
use mini_nest::distributions::{CircGauss, FnProblem, Problem};

let gauss = CircGauss::new(2, 0.1);
assert_eq!(gauss.log_likelihood(&[0.5, 0.5]), 0.0);

// Any pair of closures works as well.
let shifted = FnProblem::new(
    |x: &[f64]| -x.iter().map(|xi| xi * xi).sum::<f64>(),
    |u: &[f64]| u.iter().map(|ui| ui * 2.0 - 1.0).collect::<Vec<f64>>(),
);
assert_eq!(shifted.transform(&[0.5, 1.0]), vec![0.0, 1.0]);
```
*/

use crate::stats::unit_ball_volume;

/// Log-likelihood returned by [`UniformDisk`] outside its support. Finite, so
/// that replacing such points is an ordinary likelihood improvement.
pub const OUTSIDE_LOGL: f64 = -1e300;

/// A likelihood over physical parameters together with its prior transform.
pub trait Problem {
    /// Log-likelihood of a point in physical parameter space.
    fn log_likelihood(&self, params: &[f64]) -> f64;

    /// Maps a unit-cube point to physical parameters. Identity by default.
    fn transform(&self, cube: &[f64]) -> Vec<f64> {
        cube.to_vec()
    }

    /// Volume of `{L > lmin}` when it is known to have finite measure inside
    /// the target support, and a non-finite value otherwise.
    ///
    /// The default reports the whole unit cube, so every threshold counts.
    fn volume(&self, _lmin: f64) -> f64 {
        1.0
    }
}

impl<T: Problem + ?Sized> Problem for &T {
    fn log_likelihood(&self, params: &[f64]) -> f64 {
        (**self).log_likelihood(params)
    }

    fn transform(&self, cube: &[f64]) -> Vec<f64> {
        (**self).transform(cube)
    }

    fn volume(&self, lmin: f64) -> f64 {
        (**self).volume(lmin)
    }
}

/// Wraps a log-likelihood closure and a transform closure.
#[derive(Clone)]
pub struct FnProblem<L, T> {
    loglike: L,
    transform: T,
}

impl<L, T> FnProblem<L, T>
where
    L: Fn(&[f64]) -> f64,
    T: Fn(&[f64]) -> Vec<f64>,
{
    pub fn new(loglike: L, transform: T) -> Self {
        Self { loglike, transform }
    }
}

impl<L, T> Problem for FnProblem<L, T>
where
    L: Fn(&[f64]) -> f64,
    T: Fn(&[f64]) -> Vec<f64>,
{
    fn log_likelihood(&self, params: &[f64]) -> f64 {
        (self.loglike)(params)
    }

    fn transform(&self, cube: &[f64]) -> Vec<f64> {
        (self.transform)(cube)
    }
}

/// Flat likelihood on the ball of radius 0.5 inscribed in the unit cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformDisk {
    pub n_dim: usize,
}

impl UniformDisk {
    pub fn new(n_dim: usize) -> Self {
        Self { n_dim }
    }
}

impl Problem for UniformDisk {
    fn log_likelihood(&self, params: &[f64]) -> f64 {
        let r2: f64 = params.iter().map(|x| (x - 0.5).powi(2)).sum();
        if r2 < 0.25 {
            0.0
        } else {
            OUTSIDE_LOGL
        }
    }

    fn volume(&self, lmin: f64) -> f64 {
        if lmin < 0.0 {
            unit_ball_volume(self.n_dim) * 0.5f64.powi(self.n_dim as i32)
        } else {
            0.0
        }
    }
}

/// Isotropic Gaussian centred in the unit cube (unnormalised, peak at 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircGauss {
    pub n_dim: usize,
    pub sigma: f64,
}

impl CircGauss {
    pub fn new(n_dim: usize, sigma: f64) -> Self {
        Self { n_dim, sigma }
    }
}

impl Problem for CircGauss {
    fn log_likelihood(&self, params: &[f64]) -> f64 {
        -0.5 * params
            .iter()
            .map(|x| ((x - 0.5) / self.sigma).powi(2))
            .sum::<f64>()
    }

    /// Volume of the likelihood ball; infinite while the ball still pokes out
    /// of the cube.
    fn volume(&self, lmin: f64) -> f64 {
        let radius = (-2.0 * lmin).max(0.0).sqrt() * self.sigma;
        if radius > 0.5 {
            return f64::INFINITY;
        }
        unit_ball_volume(self.n_dim) * radius.powi(self.n_dim as i32)
    }
}

/// Axis-aligned Gaussian with one width per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymGauss {
    pub sigmas: Vec<f64>,
}

impl AsymGauss {
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self { sigmas }
    }

    /// Widths spread geometrically from `base` towards `10 * base`.
    pub fn with_spread(n_dim: usize, base: f64) -> Self {
        let sigmas = (0..n_dim)
            .map(|i| base * 10f64.powf(i as f64 / n_dim as f64))
            .collect();
        Self { sigmas }
    }
}

impl Problem for AsymGauss {
    fn log_likelihood(&self, params: &[f64]) -> f64 {
        -0.5 * params
            .iter()
            .zip(&self.sigmas)
            .map(|(x, s)| ((x - 0.5) / s).powi(2))
            .sum::<f64>()
    }

    fn volume(&self, lmin: f64) -> f64 {
        let scale = (-2.0 * lmin).max(0.0).sqrt();
        if self.sigmas.iter().any(|s| s * scale > 0.5) {
            return f64::INFINITY;
        }
        let axes: f64 = self.sigmas.iter().map(|s| s * scale).product();
        unit_ball_volume(self.sigmas.len()) * axes
    }
}
