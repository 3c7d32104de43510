//! # Kinematic fit engine
//!
//! [`KinFitter`] owns a set of [`FitParticle`]s and [`Constraint`]s and adjusts the
//! particles' free parameters so that every constraint is satisfied while the weighted
//! deviation from the measurement,
//!
//! ```text
//! S = (y − y₀)ᵀ W (y − y₀),     W = block-diag(Σ₁⁻¹, …, Σₖ⁻¹)
//! ```
//!
//! is minimal. The minimization uses the Newton–Lagrange method: constraints are linearized
//! at the current iterate and the resulting KKT system is solved for the correction `Δ`
//! and the Lagrange multipliers `λ`.
//!
//! ## Workflow
//!
//! 1. Register particles with [`KinFitter::add_particle`] and constraints with
//!    [`KinFitter::add_constraint`]. This is done once per hypothesis.
//! 2. For each candidate, call [`KinFitter::initialize`] for every particle.
//! 3. Call [`KinFitter::fit`] and keep the returned [`FitResult`].
//!
//! ## State machine
//!
//! ```text
//! Uninitialized ──initialize all──▶ Ready ──fit──▶ Converged | MaxIterationsReached | Failed
//! ```
//!
//! Every fit starts from the measured values, so calling [`KinFitter::fit`] twice without
//! re-initializing yields the same result.
//!
//! ## Example
//!
//! ```rust
//! use kinfit::constraints::Constraint;
//! use kinfit::fit_particle::Parametrization;
//! use kinfit::four_momentum::FourMomentum;
//! use kinfit::kin_fitter::{FitParams, KinFitter};
//! use nalgebra::DMatrix;
//!
//! let mut fitter = KinFitter::new(FitParams::default());
//! let q = fitter.add_particle("q", Parametrization::EtEtaPhi);
//! let qbar = fitter.add_particle("qbar", Parametrization::EtEtaPhi);
//! fitter
//!     .add_constraint(Constraint::invariant_mass("W mass", &[q, qbar], 80.4))
//!     .unwrap();
//!
//! let cov = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![25.0, 0.0025, 0.0025]));
//! fitter.initialize(q, &FourMomentum::from_pt_eta_phi_m(50.0, 0.0, 0.0, 0.0), &cov).unwrap();
//! fitter.initialize(qbar, &FourMomentum::from_pt_eta_phi_m(40.0, 0.0, 2.0, 0.0), &cov).unwrap();
//!
//! let result = fitter.fit().unwrap();
//! assert!(result.is_converged());
//! ```
//!
//! ## See also
//! ------------
//! * [`FitParams`] – Iteration cap and convergence thresholds.
//! * [`TopKinFitter`](crate::hypotheses::TopKinFitter) – Preconfigured top-quark hypotheses.

pub mod fit_result;
mod fit_state;
pub mod params;

use std::fmt;

use log::{debug, trace, warn};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::{
    constraints::Constraint,
    fit_particle::{FitParticle, ParticleId, Parametrization},
    four_momentum::FourMomentum,
    kinfit_errors::KinFitError,
    linalg::{block_diagonal, checked_inverse},
};

use fit_state::{
    chi2, fitted_covariance, parameter_offsets, solve_step, stacked_deviation, FitState,
    Linearization,
};

pub use fit_result::{FitResult, FitStatus, FittedParticle, NumericalFailure};
pub use params::{FitParams, FitParamsBuilder};

/// Lifecycle state of a [`KinFitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitterState {
    /// At least one particle has no measurement.
    Uninitialized,
    /// All particles are initialized, no fit has run since.
    Ready,
    Converged,
    MaxIterationsReached,
    Failed,
}

/// Generic constrained kinematic fitter.
#[derive(Debug, Clone)]
pub struct KinFitter {
    params: FitParams,
    particles: Vec<FitParticle>,
    constraints: Vec<Constraint>,
    state: FitterState,
}

impl KinFitter {
    pub fn new(params: FitParams) -> Self {
        KinFitter {
            params,
            particles: Vec::new(),
            constraints: Vec::new(),
            state: FitterState::Uninitialized,
        }
    }

    pub fn params(&self) -> &FitParams {
        &self.params
    }

    /// Register a particle and return its handle.
    pub fn add_particle(
        &mut self,
        name: impl Into<String>,
        parametrization: Parametrization,
    ) -> ParticleId {
        self.particles
            .push(FitParticle::new(name, parametrization));
        self.state = FitterState::Uninitialized;
        ParticleId(self.particles.len() - 1)
    }

    /// Register a constraint.
    ///
    /// Return
    /// ----------
    /// * `Err` when the constraint has no member, references a particle that does not
    ///   belong to this fitter, or has an invalid target.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), KinFitError> {
        constraint.validate(self.particles.len())?;
        self.constraints.push(constraint);
        Ok(())
    }

    fn particle_index(&self, id: ParticleId) -> Result<usize, KinFitError> {
        if id.0 < self.particles.len() {
            Ok(id.0)
        } else {
            Err(KinFitError::UnknownParticle(id.0))
        }
    }

    /// Provide the measurement of one particle for the next fit.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: handle returned by [`KinFitter::add_particle`].
    /// * `measured`: measured four-momentum.
    /// * `covariance`: covariance in the particle's parametrization basis.
    ///
    /// Return
    /// ----------
    /// * `Ok(())` or the configuration error reported by [`FitParticle::initialize`].
    pub fn initialize(
        &mut self,
        id: ParticleId,
        measured: &FourMomentum,
        covariance: &DMatrix<f64>,
    ) -> Result<(), KinFitError> {
        let idx = self.particle_index(id)?;
        self.particles[idx].initialize(measured, covariance)?;
        self.state = if self.particles.iter().all(FitParticle::is_initialized) {
            FitterState::Ready
        } else {
            FitterState::Uninitialized
        };
        Ok(())
    }

    pub fn particle(&self, id: ParticleId) -> Result<&FitParticle, KinFitError> {
        Ok(&self.particles[self.particle_index(id)?])
    }

    pub fn particles(&self) -> &[FitParticle] {
        &self.particles
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Degrees of freedom: the number of scalar constraints.
    pub fn ndf(&self) -> usize {
        self.constraints.len()
    }

    pub fn state(&self) -> FitterState {
        self.state
    }

    fn n_params(&self) -> usize {
        self.particles.iter().map(FitParticle::n_params).sum()
    }

    /// Run the Newton–Lagrange iteration from the measured values.
    ///
    /// Return
    /// ----------
    /// * `Ok(FitResult)` for every numerical outcome, including failures, which are
    ///   reported through [`FitStatus::Failed`].
    /// * `Err(KinFitError::ParticleNotInitialized)` when a particle has no measurement.
    ///
    /// See also
    /// ------------
    /// * [`FitParams`] – Convergence thresholds and iteration cap.
    /// * [`FitResult`] – Returned snapshot and its status codes.
    pub fn fit(&mut self) -> Result<FitResult, KinFitError> {
        if let Some(p) = self.particles.iter().find(|p| !p.is_initialized()) {
            return Err(KinFitError::ParticleNotInitialized(p.name().to_string()));
        }
        self.particles.iter_mut().for_each(FitParticle::reset);

        let n = self.n_params();
        let m = self.constraints.len();
        let offsets = parameter_offsets(&self.particles);

        if m == 0 {
            let covariances = self
                .particles
                .iter()
                .map(|p| p.covariance().cloned())
                .collect::<Result<Vec<_>, _>>()?;
            self.state = FitterState::Converged;
            return self.build_result(FitStatus::Converged, 0.0, 0, &DVector::zeros(0), &covariances);
        }

        let Some(weight) = self.weight_matrix()? else {
            return self.fail(NumericalFailure::SingularCovariance, 0);
        };

        let mut lin = Linearization::evaluate(&self.constraints, &self.particles, &offsets, n)?;
        if !lin.is_finite() {
            return self.fail(NumericalFailure::NonFiniteValues, 0);
        }
        let mut state = FitState::at_measurement(n, m, lin.violation());

        let mut status = FitStatus::MaxIterationsReached;
        let mut n_iter = 0;
        while n_iter < self.params.max_nr_iter {
            n_iter += 1;

            let Some((delta, lambda)) = solve_step(&weight, &lin, &state.deviation) else {
                return self.fail(NumericalFailure::SingularNormalEquations, n_iter);
            };
            if delta.iter().any(|x| !x.is_finite()) {
                return self.fail(NumericalFailure::NonFiniteValues, n_iter);
            }

            for (p, &start) in self.particles.iter_mut().zip(&offsets) {
                let k = p.n_params();
                p.apply_update(&delta.rows(start, k).into_owned())?;
            }

            lin = Linearization::evaluate(&self.constraints, &self.particles, &offsets, n)?;
            if !lin.is_finite() {
                return self.fail(NumericalFailure::NonFiniteValues, n_iter);
            }

            let s_prev = state.s;
            state.deviation = stacked_deviation(&self.particles, n)?;
            state.lambda = lambda;
            state.s = chi2(&weight, &state.deviation);
            state.f = lin.violation();

            if self.params.verbosity >= 2 {
                trace!(
                    "iteration {n_iter}: S = {:.6e}, F = {:.6e}, |lambda| = {:.3e}",
                    state.s,
                    state.f,
                    state.lambda.norm()
                );
            }
            if !state.s.is_finite() {
                return self.fail(NumericalFailure::NonFiniteValues, n_iter);
            }

            if (state.s - s_prev).abs() < self.params.max_delta_s && state.f < self.params.max_f
            {
                status = FitStatus::Converged;
                break;
            }
        }

        let Some(cov) = fitted_covariance(&weight, &lin.jacobian) else {
            return self.fail(NumericalFailure::SingularNormalEquations, n_iter);
        };
        let covariances = self
            .particles
            .iter()
            .zip(&offsets)
            .map(|(p, &start)| {
                let k = p.n_params();
                cov.view((start, start), (k, k)).into_owned()
            })
            .collect::<Vec<_>>();

        self.state = match status {
            FitStatus::Converged => FitterState::Converged,
            _ => FitterState::MaxIterationsReached,
        };
        debug!(
            "kinematic fit {status} after {n_iter} iteration(s): S = {:.4}, F = {:.3e}",
            state.s, state.f
        );
        self.build_result(status, state.s, n_iter, &lin.residuals, &covariances)
    }

    /// `W = block-diag(Σᵢ⁻¹)`, or `None` when a covariance is singular.
    fn weight_matrix(&self) -> Result<Option<DMatrix<f64>>, KinFitError> {
        let mut blocks = Vec::with_capacity(self.particles.len());
        for p in &self.particles {
            match checked_inverse(p.covariance()?) {
                Some(inv) => blocks.push(inv),
                None => {
                    if self.params.verbosity >= 1 {
                        warn!("covariance of particle {} is singular", p.name());
                    }
                    return Ok(None);
                }
            }
        }
        Ok(Some(block_diagonal(&blocks)))
    }

    /// Report a numerical failure: particles back to their measurements, `S = +∞`.
    fn fail(&mut self, reason: NumericalFailure, n_iter: usize) -> Result<FitResult, KinFitError> {
        self.particles.iter_mut().for_each(FitParticle::reset);
        self.state = FitterState::Failed;
        if self.params.verbosity >= 1 {
            warn!("kinematic fit failed after {n_iter} iteration(s): {reason}");
        }

        let residuals = self
            .constraints
            .iter()
            .map(|c| c.residual(&self.particles))
            .collect::<Result<Vec<_>, _>>()?;
        let covariances = self
            .particles
            .iter()
            .map(|p| p.covariance().cloned())
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = self.build_result(
            FitStatus::Failed(reason),
            f64::INFINITY,
            n_iter,
            &DVector::from_vec(residuals),
            &covariances,
        )?;
        result.prob = 0.0;
        Ok(result)
    }

    fn build_result(
        &self,
        status: FitStatus,
        s: f64,
        n_iterations: usize,
        residuals: &DVector<f64>,
        covariances: &[DMatrix<f64>],
    ) -> Result<FitResult, KinFitError> {
        let particles = self
            .particles
            .iter()
            .zip(covariances)
            .map(|(p, cov)| {
                let jac = p.jacobian_to_cartesian()?;
                Ok(FittedParticle {
                    name: p.name().to_string(),
                    parametrization: p.parametrization(),
                    momentum: p.current_four_momentum()?,
                    measured: p.measured_four_momentum()?,
                    params: p.current_params()?.clone(),
                    covariance: cov.clone(),
                    cartesian_covariance: &jac * cov * jac.transpose(),
                })
            })
            .collect::<Result<Vec<_>, KinFitError>>()?;

        let ndf = self.ndf();
        Ok(FitResult {
            status,
            chi2: s,
            ndf,
            prob: chi2_probability(s, ndf),
            n_iterations,
            constraint_violation: residuals.iter().map(|f| f.abs()).sum(),
            constraint_residuals: residuals.iter().copied().collect(),
            particles,
        })
    }
}

/// Upper-tail χ² probability of `s` with `ndf` degrees of freedom, `1` when `ndf = 0`.
pub fn chi2_probability(s: f64, ndf: usize) -> f64 {
    if ndf == 0 {
        return 1.0;
    }
    if !s.is_finite() {
        return 0.0;
    }
    ChiSquared::new(ndf as f64)
        .map(|dist| dist.sf(s.max(0.0)))
        .unwrap_or(0.0)
}

impl fmt::Display for KinFitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "KinFitter({} particle(s), {} constraint(s), state={:?})",
            self.particles.len(),
            self.constraints.len(),
            self.state
        )?;
        for (i, p) in self.particles.iter().enumerate() {
            writeln!(f, "  #{i} {p}")?;
        }
        for c in &self.constraints {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}
