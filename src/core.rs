//! The live-point population and guarded likelihood evaluation.

use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::distributions::Problem;
use crate::error::NestError;

/// Positions in the unit cube (one row per point) and their cached
/// log-likelihoods. The number of points never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePoints {
    u: Array2<f64>,
    logl: Array1<f64>,
}

impl LivePoints {
    pub fn new(u: Array2<f64>, logl: Array1<f64>) -> Result<Self, NestError> {
        if u.nrows() != logl.len() {
            return Err(NestError::InvalidConfig(format!(
                "{} live points but {} log-likelihoods",
                u.nrows(),
                logl.len()
            )));
        }
        if u.nrows() == 0 {
            return Err(NestError::InvalidConfig("no live points".to_string()));
        }
        Ok(Self { u, logl })
    }

    /// Draws `n_live` points uniformly in `[0, 1)^n_dim` and evaluates each
    /// one once.
    pub fn uniform<P: Problem + ?Sized>(
        n_live: usize,
        n_dim: usize,
        problem: &P,
        rng: &mut SmallRng,
    ) -> Result<Self, NestError> {
        let u = Array2::from_shape_simple_fn((n_live, n_dim), || rng.gen::<f64>());
        let logl = u
            .rows()
            .into_iter()
            .map(|row| evaluate(problem, row).map(|(_, logl)| logl))
            .collect::<Result<Array1<f64>, _>>()?;
        Self::new(u, logl)
    }

    pub fn len(&self) -> usize {
        self.u.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.u.nrows() == 0
    }

    pub fn ndim(&self) -> usize {
        self.u.ncols()
    }

    pub fn u(&self) -> &Array2<f64> {
        &self.u
    }

    pub fn logl(&self) -> &Array1<f64> {
        &self.logl
    }

    pub fn point(&self, index: usize) -> ArrayView1<f64> {
        self.u.row(index)
    }

    /// Index and log-likelihood of the lowest live point (first one on ties).
    pub fn worst(&self) -> (usize, f64) {
        let index = self.logl.argmin().unwrap_or(0);
        (index, self.logl[index])
    }

    pub fn replace(&mut self, index: usize, u: ArrayView1<f64>, logl: f64) {
        self.u.row_mut(index).assign(&u);
        self.logl[index] = logl;
    }
}

/// Maps a cube point through the problem's transform and evaluates it.
/// NaN and infinite log-likelihoods are errors.
pub fn evaluate<P: Problem + ?Sized>(
    problem: &P,
    u: ArrayView1<f64>,
) -> Result<(Vec<f64>, f64), NestError> {
    let cube = u.to_vec();
    let v = problem.transform(&cube);
    let logl = problem.log_likelihood(&v);
    if !logl.is_finite() {
        return Err(NestError::NonFiniteLikelihood {
            point: cube,
            value: logl,
        });
    }
    Ok((v, logl))
}
