//! Error types shared by every stage of a live-point evolution.

use std::fmt;
use thiserror::Error;

/// The stage of a run in which a failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Drawing the initial live points and fitting the first region.
    Initialization,
    /// Periodic rebuild of the transform layer and region.
    Refresh,
    /// Searching for a replacement of the worst live point.
    Proposal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initialization => "initialization",
            Phase::Refresh => "region refresh",
            Phase::Proposal => "proposal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum NestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Log-likelihood evaluated to {value} at {point:?}")]
    NonFiniteLikelihood { point: Vec<f64>, value: f64 },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("No live point lies inside the current region")]
    EmptyRegion,

    #[error("Exploration stalled: {attempts} consecutive proposals failed to exceed threshold {lmin}")]
    Stalled { attempts: usize, lmin: f64 },

    #[error("{phase} failed at iteration {iteration}: {source}")]
    Run {
        phase: Phase,
        iteration: usize,
        #[source]
        source: Box<NestError>,
    },
}

impl NestError {
    /// The phase this error was raised in, if it crossed the run boundary.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            NestError::Run { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The innermost cause, with any phase wrappers peeled off.
    pub fn root(&self) -> &NestError {
        match self {
            NestError::Run { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Tags the error of a fallible stage with the phase it happened in.
pub(crate) trait DuringPhase<T> {
    fn during(self, phase: Phase, iteration: usize) -> Result<T, NestError>;
}

impl<T> DuringPhase<T> for Result<T, NestError> {
    fn during(self, phase: Phase, iteration: usize) -> Result<T, NestError> {
        self.map_err(|source| NestError::Run {
            phase,
            iteration,
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_peels_phase_wrappers() {
        let err: Result<(), NestError> = Err(NestError::Stalled {
            attempts: 3,
            lmin: -1.0,
        });
        let err = err.during(Phase::Proposal, 7).unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Proposal));
        assert!(matches!(err.root(), NestError::Stalled { attempts: 3, .. }));
        let msg = err.to_string();
        assert!(msg.starts_with("proposal failed at iteration 7"), "{msg}");
    }

    #[test]
    fn plain_errors_have_no_phase() {
        let err = NestError::EmptyRegion;
        assert_eq!(err.phase(), None);
        assert!(matches!(err.root(), NestError::EmptyRegion));
    }
}
