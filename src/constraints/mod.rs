//! # Kinematic constraints
//!
//! A [`Constraint`] is a scalar function of the four-momenta of one or more particles that
//! must vanish at the solution of the fit. Members reference particles through
//! [`ParticleId`] handles and carry a [`Sign`], so a constraint operates on the **signed
//! sum** `P = Σ sᵢ pᵢ` of its members.
//!
//! ## Kinds
//!
//! * [`ConstraintKind::InvariantMass`] – `m(P) = target`. The residual is `m(P) − target`
//!   for a positive target and `m²(P)` for a zero target, which keeps masslessness
//!   constraints differentiable at the solution.
//! * [`ConstraintKind::MomentumSum`] – one Cartesian component of `P` equals `target`
//!   (e.g. transverse momentum balance, energy conservation).
//!
//! Constraints are immutable after construction and hold no per-iteration state; the
//! engine evaluates [`Constraint::residual`] and [`Constraint::gradient`] at each iterate.
//!
//! ```rust
//! use kinfit::constraints::Constraint;
//! use kinfit::fit_particle::Parametrization;
//! use kinfit::kin_fitter::{FitParams, KinFitter};
//!
//! let mut fitter = KinFitter::new(FitParams::default());
//! let q = fitter.add_particle("q", Parametrization::EtEtaPhi);
//! let qbar = fitter.add_particle("qbar", Parametrization::EtEtaPhi);
//! fitter
//!     .add_constraint(Constraint::invariant_mass("W mass", &[q, qbar], 80.4))
//!     .unwrap();
//! ```

use std::fmt;

use itertools::Itertools;
use nalgebra::{DVector, Vector4};
use serde::{Deserialize, Serialize};

use crate::{
    constants::GeV,
    fit_particle::{FitParticle, ParticleId},
    four_momentum::FourMomentum,
    kinfit_errors::KinFitError,
};

/// Sign with which a member enters the constrained sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn factor(&self) -> f64 {
        match self {
            Sign::Plus => 1.0,
            Sign::Minus => -1.0,
        }
    }
}

/// Cartesian component selected by a [`ConstraintKind::MomentumSum`] constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Px,
    Py,
    Pz,
    E,
}

impl Component {
    /// Row of the component in the `(px, py, pz, E)` ordering.
    pub fn index(&self) -> usize {
        match self {
            Component::Px => 0,
            Component::Py => 1,
            Component::Pz => 2,
            Component::E => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintKind {
    InvariantMass { target: GeV },
    MomentumSum { component: Component, target: GeV },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Member {
    pub particle: ParticleId,
    pub sign: Sign,
}

/// Scalar equality constraint on the signed sum of its members' four-momenta.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    name: String,
    kind: ConstraintKind,
    members: Vec<Member>,
}

impl Constraint {
    /// Invariant mass of the (positive) sum of `particles` equals `target`.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: label used in logs and errors.
    /// * `particles`: one particle for a mass-shell condition, two or three for the usual
    ///   W-boson and top-quark hypotheses.
    /// * `target`: required mass in GeV; `0.0` imposes masslessness.
    ///
    /// Return
    /// ----------
    /// * The constraint. Its consistency with a particular fitter is checked by
    ///   [`KinFitter::add_constraint`](crate::kin_fitter::KinFitter::add_constraint).
    pub fn invariant_mass(name: impl Into<String>, particles: &[ParticleId], target: GeV) -> Self {
        Constraint {
            name: name.into(),
            kind: ConstraintKind::InvariantMass { target },
            members: particles
                .iter()
                .map(|&particle| Member {
                    particle,
                    sign: Sign::Plus,
                })
                .collect(),
        }
    }

    pub fn massless(name: impl Into<String>, particle: ParticleId) -> Self {
        Constraint::invariant_mass(name, &[particle], 0.0)
    }

    /// Component `component` of the signed sum of `members` equals `target`.
    pub fn momentum_sum(
        name: impl Into<String>,
        component: Component,
        members: &[(ParticleId, Sign)],
        target: GeV,
    ) -> Self {
        Constraint {
            name: name.into(),
            kind: ConstraintKind::MomentumSum { component, target },
            members: members
                .iter()
                .map(|&(particle, sign)| Member { particle, sign })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Check the constraint against a fitter holding `n_particles` particles.
    pub(crate) fn validate(&self, n_particles: usize) -> Result<(), KinFitError> {
        if self.members.is_empty() {
            return Err(KinFitError::EmptyConstraint(self.name.clone()));
        }
        if let Some(m) = self.members.iter().find(|m| m.particle.0 >= n_particles) {
            return Err(KinFitError::UnknownParticle(m.particle.0));
        }

        let target = match self.kind {
            ConstraintKind::InvariantMass { target } => target,
            ConstraintKind::MomentumSum { target, .. } => target,
        };
        let valid = match self.kind {
            ConstraintKind::InvariantMass { .. } => target.is_finite() && target >= 0.0,
            ConstraintKind::MomentumSum { .. } => target.is_finite(),
        };
        if !valid {
            return Err(KinFitError::InvalidConstraintTarget {
                constraint: self.name.clone(),
                target,
            });
        }
        Ok(())
    }

    fn signed_sum(&self, particles: &[FitParticle]) -> Result<FourMomentum, KinFitError> {
        self.members.iter().try_fold(FourMomentum::default(), |acc, m| {
            let p = particles[m.particle.0].current_four_momentum()?;
            Ok(acc + p * m.sign.factor())
        })
    }

    /// Current signed deviation from the target, zero when the constraint is satisfied.
    pub fn residual(&self, particles: &[FitParticle]) -> Result<f64, KinFitError> {
        let sum = self.signed_sum(particles)?;
        Ok(match self.kind {
            ConstraintKind::InvariantMass { target } if target == 0.0 => sum.m2(),
            ConstraintKind::InvariantMass { target } => sum.m() - target,
            ConstraintKind::MomentumSum { component, target } => {
                sum.to_vector()[component.index()] - target
            }
        })
    }

    /// Derivative of the residual with respect to the `(px, py, pz, E)` components of the
    /// signed sum.
    fn cartesian_gradient(&self, sum: &FourMomentum) -> Vector4<f64> {
        match self.kind {
            ConstraintKind::InvariantMass { target } if target == 0.0 => {
                Vector4::new(-sum.px(), -sum.py(), -sum.pz(), sum.e()) * 2.0
            }
            ConstraintKind::InvariantMass { .. } => {
                // d|m|/dP, infinite at m = 0 where the residual is not differentiable
                Vector4::new(-sum.px(), -sum.py(), -sum.pz(), sum.e()) / sum.m().abs()
            }
            ConstraintKind::MomentumSum { component, .. } => {
                let mut g = Vector4::zeros();
                g[component.index()] = 1.0;
                g
            }
        }
    }

    /// Gradient of the residual with respect to each member's free parameters.
    ///
    /// Return
    /// ----------
    /// * One `(particle, row)` pair per member, in member order; `row` has the particle's
    ///   `n_params` entries. A particle listed twice yields two rows, which the engine adds.
    pub fn gradient(
        &self,
        particles: &[FitParticle],
    ) -> Result<Vec<(ParticleId, DVector<f64>)>, KinFitError> {
        let sum = self.signed_sum(particles)?;
        let g = self.cartesian_gradient(&sum);

        self.members
            .iter()
            .map(|m| {
                let jac = particles[m.particle.0].jacobian_to_cartesian()?;
                let row = jac.tr_mul(&g) * m.sign.factor();
                Ok((m.particle, DVector::from_iterator(row.len(), row.iter().copied())))
            })
            .collect()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self
            .members
            .iter()
            .map(|m| match m.sign {
                Sign::Plus => format!("+{}", m.particle),
                Sign::Minus => format!("-{}", m.particle),
            })
            .join(" ");
        match self.kind {
            ConstraintKind::InvariantMass { target } => {
                write!(f, "{}: m({members}) = {target} GeV", self.name)
            }
            ConstraintKind::MomentumSum { component, target } => {
                write!(f, "{}: {component:?}({members}) = {target} GeV", self.name)
            }
        }
    }
}
