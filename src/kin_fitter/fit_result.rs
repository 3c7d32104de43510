//! # Kinematic fit results
//!
//! A [`FitResult`] is the immutable snapshot returned by
//! [`KinFitter::fit`](crate::kin_fitter::KinFitter::fit). It is owned by the caller and
//! stays valid after the engine is re-initialized for the next candidate.
//!
//! ## Status codes
//!
//! | Status                                 | Code  | Fitted values |
//! |----------------------------------------|-------|---------------|
//! | [`FitStatus::Converged`]               | `0`   | solution |
//! | [`FitStatus::MaxIterationsReached`]    | `1`   | last iterate, usable |
//! | [`FitStatus::Failed`]                  | `-1`  | measured values, `S = +∞` |
//! | [`FitStatus::Aborted`]                 | `-10` | none, the engine did not run |
//!
//! The integer codes match the historical status flags of the top-quark fitters.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::{
    fit_particle::Parametrization,
    four_momentum::FourMomentum,
};

/// Numerical condition that stopped a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericalFailure {
    /// A measurement covariance could not be inverted.
    SingularCovariance,
    /// The KKT normal matrix could not be inverted.
    SingularNormalEquations,
    /// Residuals, gradients or corrections became NaN or infinite.
    NonFiniteValues,
}

impl fmt::Display for NumericalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalFailure::SingularCovariance => write!(f, "singular covariance matrix"),
            NumericalFailure::SingularNormalEquations => write!(f, "singular normal equations"),
            NumericalFailure::NonFiniteValues => write!(f, "non-finite values"),
        }
    }
}

/// Terminal status of a fit.
#[derive(Debug, Clone, PartialEq)]
pub enum FitStatus {
    Converged,
    MaxIterationsReached,
    Failed(NumericalFailure),
    Aborted(String),
}

impl FitStatus {
    /// Integer status code: `0`, `1`, `-1` or `-10`.
    pub fn code(&self) -> i32 {
        match self {
            FitStatus::Converged => 0,
            FitStatus::MaxIterationsReached => 1,
            FitStatus::Failed(_) => -1,
            FitStatus::Aborted(_) => -10,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, FitStatus::Converged)
    }

    /// Whether the fitted values are meaningful (converged or iteration-exhausted).
    pub fn is_usable(&self) -> bool {
        matches!(self, FitStatus::Converged | FitStatus::MaxIterationsReached)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, FitStatus::Aborted(_))
    }
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStatus::Converged => write!(f, "converged"),
            FitStatus::MaxIterationsReached => write!(f, "maximum number of iterations reached"),
            FitStatus::Failed(reason) => write!(f, "failed ({reason})"),
            FitStatus::Aborted(reason) => write!(f, "aborted ({reason})"),
        }
    }
}

/// Fitted state of one particle.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedParticle {
    pub name: String,
    pub parametrization: Parametrization,
    /// Fitted four-momentum.
    pub momentum: FourMomentum,
    /// Measured four-momentum the fit started from.
    pub measured: FourMomentum,
    /// Fitted free parameters.
    pub params: DVector<f64>,
    /// Fitted covariance over the free parameters.
    pub covariance: DMatrix<f64>,
    /// Fitted covariance propagated to `(px, py, pz, E)`: `J Σ Jᵀ`.
    pub cartesian_covariance: DMatrix<f64>,
}

impl FittedParticle {
    /// Square roots of the diagonal of the fitted parameter covariance.
    ///
    /// Tiny negative diagonal entries produced by rounding are clamped to zero.
    pub fn resolutions(&self) -> DVector<f64> {
        self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
    }

    /// Row-major flattening of the fitted parameter covariance.
    pub fn covariance_flat(&self) -> Vec<f64> {
        self.covariance.transpose().as_slice().to_vec()
    }
}

/// Outcome of a kinematic fit.
///
/// See also
/// ------------
/// * [`FitStatus`] – Terminal status and its integer code.
/// * [`CandidateRanking`](crate::ranking::CandidateRanking) – Ordering of results by `chi2`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub status: FitStatus,
    /// Fit statistic `S = (y − y₀)ᵀ W (y − y₀)`.
    pub chi2: f64,
    /// Degrees of freedom, the number of scalar constraints.
    pub ndf: usize,
    /// Upper-tail χ² probability of `chi2` with `ndf` degrees of freedom.
    pub prob: f64,
    pub n_iterations: usize,
    /// Total constraint violation `F = Σ|fᵢ|` at the reported values.
    pub constraint_violation: f64,
    /// Residual of each constraint at the reported values, in registration order.
    pub constraint_residuals: Vec<f64>,
    /// One entry per particle, in registration order.
    pub particles: Vec<FittedParticle>,
}

impl FitResult {
    /// Result for a candidate that never reached the engine.
    pub fn aborted(reason: impl Into<String>, ndf: usize) -> Self {
        FitResult {
            status: FitStatus::Aborted(reason.into()),
            chi2: f64::INFINITY,
            ndf,
            prob: 0.0,
            n_iterations: 0,
            constraint_violation: f64::INFINITY,
            constraint_residuals: Vec::new(),
            particles: Vec::new(),
        }
    }

    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Look a fitted particle up by name.
    pub fn particle(&self, name: &str) -> Option<&FittedParticle> {
        self.particles.iter().find(|p| p.name == name)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FitResult(status={} [{}], chi2={:.4}, ndf={}, prob={:.4}, iterations={}, F={:.3e})",
            self.status,
            self.status.code(),
            self.chi2,
            self.ndf,
            self.prob,
            self.n_iterations,
            self.constraint_violation
        )?;
        if f.alternate() {
            for p in &self.particles {
                write!(f, "\n  {:<12} {:#}", p.name, p.momentum)?;
            }
        }
        Ok(())
    }
}
