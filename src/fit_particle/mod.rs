//! # Parametrized particles
//!
//! This module defines [`FitParticle`], the unit the kinematic fitter adjusts. A particle
//! couples a four-momentum with a [`Parametrization`] and a covariance matrix expressed
//! over that parametrization's free parameters.
//!
//! ## Lifecycle
//!
//! 1. **Setup** – created once by the fit engine with a name and a parametrization
//!    ([`KinFitter::add_particle`](crate::kin_fitter::KinFitter::add_particle)).
//! 2. **Initialization** – per candidate, [`FitParticle::initialize`] projects the measured
//!    four-momentum into the free-parameter basis and stores the covariance.
//! 3. **Iteration** – the engine reads [`FitParticle::jacobian_to_cartesian`] and pushes
//!    corrections through [`FitParticle::apply_update`].
//! 4. **Extraction** – the fitted four-momentum is read from
//!    [`FitParticle::current_four_momentum`].
//!
//! The measured parameter vector is kept alongside the current one, so the engine can
//! restart every fit from the measurement with [`FitParticle::reset`].
//!
//! ## See also
//! ------------
//! * [`Parametrization`] – Free-parameter bases and their Jacobians.
//! * [`Constraint`](crate::constraints::Constraint) – Consumers of the Cartesian Jacobian.

pub mod parametrization;

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::{
    four_momentum::FourMomentum,
    kinfit_errors::KinFitError,
    linalg::check_covariance,
};

pub use parametrization::{ParamReference, Parametrization};

/// Stable handle of a particle inside a [`KinFitter`](crate::kin_fitter::KinFitter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub(crate) usize);

impl ParticleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ParticleState {
    reference: ParamReference,
    measured_momentum: FourMomentum,
    measured: DVector<f64>,
    current: DVector<f64>,
    covariance: DMatrix<f64>,
}

/// A particle with a free-parameter basis and a measurement covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct FitParticle {
    name: String,
    parametrization: Parametrization,
    state: Option<ParticleState>,
}

impl FitParticle {
    pub fn new(name: impl Into<String>, parametrization: Parametrization) -> Self {
        FitParticle {
            name: name.into(),
            parametrization,
            state: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parametrization(&self) -> Parametrization {
        self.parametrization
    }

    pub fn n_params(&self) -> usize {
        self.parametrization.n_params()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Initialize the particle from a measurement.
    ///
    /// The measured four-momentum is projected into the particle's parametrization, which
    /// becomes both the measured and the current parameter vector.
    ///
    /// Arguments
    /// -----------------
    /// * `measured`: measured four-momentum (GeV).
    /// * `covariance`: covariance over the free parameters, in the parametrization's own
    ///   basis (e.g. `σ(E_T)², σ(η)², σ(φ)²` on the diagonal for [`Parametrization::EtEtaPhi`]).
    ///
    /// Return
    /// ----------
    /// * `Ok(())`, or a configuration error when the covariance has the wrong dimension, is not
    ///   symmetric positive semi-definite, or when the parametrization is degenerate at
    ///   `measured`. On error the previous state of the particle is left untouched.
    ///
    /// Note
    /// ----------
    /// * A zero covariance is accepted here: it is a valid (if extreme) claim of infinite
    ///   precision, which the fit engine reports as a numerical failure.
    pub fn initialize(
        &mut self,
        measured: &FourMomentum,
        covariance: &DMatrix<f64>,
    ) -> Result<(), KinFitError> {
        if !measured.is_finite() {
            return Err(KinFitError::NonFiniteMomentum(self.name.clone()));
        }

        let n = self.n_params();
        if covariance.shape() != (n, n) {
            return Err(KinFitError::CovarianceDimension {
                particle: self.name.clone(),
                expected: n,
                found: covariance.nrows(),
                found_cols: covariance.ncols(),
            });
        }

        check_covariance(covariance).map_err(|defect| KinFitError::InvalidCovariance {
            particle: self.name.clone(),
            reason: defect.to_string(),
        })?;

        let (y, reference) = self.parametrization.project(measured).map_err(|reason| {
            KinFitError::DegenerateParametrization {
                particle: self.name.clone(),
                parametrization: self.parametrization.to_string(),
                reason: reason.to_string(),
            }
        })?;

        self.state = Some(ParticleState {
            reference,
            measured_momentum: *measured,
            measured: y.clone(),
            current: y,
            covariance: covariance.clone(),
        });
        Ok(())
    }

    fn state(&self) -> Result<&ParticleState, KinFitError> {
        self.state
            .as_ref()
            .ok_or_else(|| KinFitError::ParticleNotInitialized(self.name.clone()))
    }

    /// Four-momentum implied by the current parameters.
    ///
    /// While no correction has been applied this is the measured four-momentum itself,
    /// bit for bit, rather than its round trip through the parametrization.
    pub fn current_four_momentum(&self) -> Result<FourMomentum, KinFitError> {
        let st = self.state()?;
        if st.current == st.measured {
            return Ok(st.measured_momentum);
        }
        Ok(self
            .parametrization
            .four_momentum(&st.current, &st.reference))
    }

    pub fn measured_four_momentum(&self) -> Result<FourMomentum, KinFitError> {
        Ok(self.state()?.measured_momentum)
    }

    /// `4 × n_params` Jacobian `∂(px, py, pz, E)/∂y` at the current parameters.
    pub fn jacobian_to_cartesian(&self) -> Result<DMatrix<f64>, KinFitError> {
        let st = self.state()?;
        Ok(self.parametrization.jacobian(&st.current, &st.reference))
    }

    /// Add `delta` to the current parameter vector.
    ///
    /// Return
    /// ----------
    /// * `Err(KinFitError::UpdateDimension)` when `delta` does not have `n_params` entries.
    pub fn apply_update(&mut self, delta: &DVector<f64>) -> Result<(), KinFitError> {
        let name = &self.name;
        let st = self
            .state
            .as_mut()
            .ok_or_else(|| KinFitError::ParticleNotInitialized(name.clone()))?;
        if delta.len() != st.current.len() {
            return Err(KinFitError::UpdateDimension {
                particle: name.clone(),
                expected: st.current.len(),
                found: delta.len(),
            });
        }
        st.current += delta;
        Ok(())
    }

    /// Restore the measured parameters as the current ones.
    pub fn reset(&mut self) {
        if let Some(st) = self.state.as_mut() {
            st.current.copy_from(&st.measured);
        }
    }

    pub fn current_params(&self) -> Result<&DVector<f64>, KinFitError> {
        Ok(&self.state()?.current)
    }

    pub fn measured_params(&self) -> Result<&DVector<f64>, KinFitError> {
        Ok(&self.state()?.measured)
    }

    pub fn covariance(&self) -> Result<&DMatrix<f64>, KinFitError> {
        Ok(&self.state()?.covariance)
    }

    /// Deviation `y − y₀` of the current parameters from the measured ones.
    pub fn deviation(&self) -> Result<DVector<f64>, KinFitError> {
        let st = self.state()?;
        Ok(&st.current - &st.measured)
    }
}

impl fmt::Display for FitParticle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.parametrization)?;
        match self.current_four_momentum() {
            Ok(p4) => write!(f, " {p4:#}"),
            Err(_) => write!(f, " (uninitialized)"),
        }
    }
}
