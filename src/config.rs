/*!
Run configuration for the live-point evolution loop.

All options are fixed when a run starts. The builder-style setters consume and
return the configuration so they can be chained:

```rust
use mini_nest::config::{LayerKind, NestConfig};

let config = NestConfig::new(40, 2)
    .set_seed(7)
    .set_n_bootstraps(20)
    .set_layer(LayerKind::Scaling);
assert!(config.validate().is_ok());
assert_eq!(config.refresh_interval(), 8);
```
*/

use crate::error::NestError;
use crate::transform::{AffineLayer, Layer, ScalingLayer};

/// Which transform layer the region is fitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerKind {
    /// Per-axis scaling in one dimension, affine whitening otherwise.
    #[default]
    Auto,
    Scaling,
    Affine,
}

impl LayerKind {
    /// Resolves `Auto` for the given dimensionality.
    pub fn resolve(self, n_dim: usize) -> LayerKind {
        match self {
            LayerKind::Auto if n_dim > 1 => LayerKind::Affine,
            LayerKind::Auto => LayerKind::Scaling,
            other => other,
        }
    }

    /// Creates an unfitted layer of this kind.
    pub fn build(self, n_dim: usize) -> Layer {
        match self.resolve(n_dim) {
            LayerKind::Affine => Layer::Affine(AffineLayer::new(n_dim)),
            _ => Layer::Scaling(ScalingLayer::new(n_dim)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestConfig {
    /// Number of live points, fixed for the whole run.
    pub n_live: usize,
    /// Dimensionality of the unit cube.
    pub n_dim: usize,
    /// The region is rebuilt every `ceil(n_live * refresh_fraction)` iterations.
    pub refresh_fraction: f64,
    /// Bootstrap rounds used to calibrate the region enlargement.
    pub n_bootstraps: usize,
    /// Minimum ellipsoid volume used for the initial region.
    pub initial_minvol: f64,
    /// The default stopping rule fires once more than
    /// `termination_multiplier * n_live` iterations counted as good.
    pub termination_multiplier: usize,
    /// Consecutive failed proposals tolerated before a run reports a stall.
    pub max_failed_proposals: usize,
    pub layer: LayerKind,
    pub seed: u64,
}

impl NestConfig {
    pub fn new(n_live: usize, n_dim: usize) -> Self {
        Self {
            n_live,
            n_dim,
            refresh_fraction: 0.2,
            n_bootstraps: 30,
            initial_minvol: 1.0,
            termination_multiplier: 2,
            max_failed_proposals: 100_000,
            layer: LayerKind::Auto,
            seed: 1,
        }
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_refresh_fraction(mut self, fraction: f64) -> Self {
        self.refresh_fraction = fraction;
        self
    }

    pub fn set_n_bootstraps(mut self, n_bootstraps: usize) -> Self {
        self.n_bootstraps = n_bootstraps;
        self
    }

    pub fn set_initial_minvol(mut self, minvol: f64) -> Self {
        self.initial_minvol = minvol;
        self
    }

    pub fn set_termination_multiplier(mut self, multiplier: usize) -> Self {
        self.termination_multiplier = multiplier;
        self
    }

    pub fn set_max_failed_proposals(mut self, max_failed: usize) -> Self {
        self.max_failed_proposals = max_failed;
        self
    }

    pub fn set_layer(mut self, layer: LayerKind) -> Self {
        self.layer = layer;
        self
    }

    /// Number of iterations between two region refreshes (at least one).
    pub fn refresh_interval(&self) -> usize {
        ((self.n_live as f64 * self.refresh_fraction).ceil() as usize).max(1)
    }

    /// Checks every option; nothing is sampled before this passes.
    pub fn validate(&self) -> Result<(), NestError> {
        if self.n_live < 2 {
            return Err(NestError::InvalidConfig(format!(
                "n_live must be at least 2, got {}",
                self.n_live
            )));
        }
        if self.n_dim == 0 {
            return Err(NestError::InvalidConfig(
                "n_dim must be at least 1".to_string(),
            ));
        }
        if !(self.refresh_fraction.is_finite() && self.refresh_fraction > 0.0) {
            return Err(NestError::InvalidConfig(format!(
                "refresh_fraction must be finite and positive, got {}",
                self.refresh_fraction
            )));
        }
        if self.n_bootstraps == 0 {
            return Err(NestError::InvalidConfig(
                "n_bootstraps must be at least 1".to_string(),
            ));
        }
        if !(self.initial_minvol.is_finite() && self.initial_minvol >= 0.0) {
            return Err(NestError::InvalidConfig(format!(
                "initial_minvol must be finite and non-negative, got {}",
                self.initial_minvol
            )));
        }
        if self.termination_multiplier == 0 {
            return Err(NestError::InvalidConfig(
                "termination_multiplier must be at least 1".to_string(),
            ));
        }
        if self.max_failed_proposals == 0 {
            return Err(NestError::InvalidConfig(
                "max_failed_proposals must be at least 1".to_string(),
            ));
        }
        // A full covariance needs more points than dimensions.
        if self.layer.resolve(self.n_dim) == LayerKind::Affine && self.n_live <= self.n_dim + 1 {
            return Err(NestError::InvalidConfig(format!(
                "the affine layer needs n_live > n_dim + 1, got n_live = {} and n_dim = {}",
                self.n_live, self.n_dim
            )));
        }
        Ok(())
    }
}
