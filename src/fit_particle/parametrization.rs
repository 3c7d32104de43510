//! # Particle parametrizations
//!
//! A [`Parametrization`] selects which physical quantities form the **free, adjustable
//! basis** of a particle in the fit. The fitter works exclusively in that basis: the
//! measurement covariance is expressed in it, corrections are added to it, and the
//! Jacobian towards Cartesian `(px, py, pz, E)` links it to the constraints.
//!
//! ## Supported bases
//!
//! | Variant          | Free parameters       | Held fixed                |
//! |------------------|-----------------------|---------------------------|
//! | `EtEtaPhi`       | `E_T, η, φ`           | mass                      |
//! | `EtThetaPhi`     | `E_T, θ, φ`           | mass                      |
//! | `InvPThetaPhi`   | `1/|p|, θ, φ`         | mass                      |
//! | `EMomDev`        | `1/|p|, θ, φ, d`      | reference mass (`E = d·sqrt(p²+m²)`) |
//! | `EScaledMomDev`  | `a, θ, φ`             | mass and measured `|p|` (`|p| = a·|p_meas|`) |
//!
//! Quantities "held fixed" are read from the measured four-momentum when the particle
//! is initialized and stored in a [`ParamReference`].
//!
//! The choice matters for the fit: corrections are additive in parameter space, so the
//! same constraint can converge faster (or slower) depending on how linear it is in the
//! chosen basis.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{GeV, MOMENTUM_EPS},
    four_momentum::FourMomentum,
    kinfit_errors::KinFitError,
};

/// Free-parameter basis of a fitted particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parametrization {
    EtEtaPhi,
    EtThetaPhi,
    InvPThetaPhi,
    EMomDev,
    EScaledMomDev,
}

/// Quantities captured from the measured four-momentum and held fixed during the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamReference {
    /// Mass of the measured four-momentum (negative `m²` is clamped to zero).
    pub mass: GeV,
    /// Measured momentum magnitude, used by [`Parametrization::EScaledMomDev`].
    pub momentum: GeV,
}

impl Parametrization {
    pub const ALL: [Parametrization; 5] = [
        Parametrization::EtEtaPhi,
        Parametrization::EtThetaPhi,
        Parametrization::InvPThetaPhi,
        Parametrization::EMomDev,
        Parametrization::EScaledMomDev,
    ];

    /// Number of free parameters, i.e. the expected covariance dimension.
    pub fn n_params(&self) -> usize {
        match self {
            Parametrization::EMomDev => 4,
            _ => 3,
        }
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Parametrization::EtEtaPhi => &["E_T", "eta", "phi"],
            Parametrization::EtThetaPhi => &["E_T", "theta", "phi"],
            Parametrization::InvPThetaPhi => &["1/p", "theta", "phi"],
            Parametrization::EMomDev => &["1/p", "theta", "phi", "d"],
            Parametrization::EScaledMomDev => &["a", "theta", "phi"],
        }
    }

    /// Map a legacy numeric parametrization code onto a variant.
    ///
    /// Codes follow the historical jet-parametrization switch of the top-quark fitters:
    /// `0 → EMomDev`, `1 → EtEtaPhi`, `2 → EtThetaPhi`.
    ///
    /// Return
    /// ----------
    /// * The matching variant, or [`KinFitError::UnsupportedParametrization`] for any other code.
    pub fn from_code(code: u32) -> Result<Self, KinFitError> {
        match code {
            0 => Ok(Parametrization::EMomDev),
            1 => Ok(Parametrization::EtEtaPhi),
            2 => Ok(Parametrization::EtThetaPhi),
            other => Err(KinFitError::UnsupportedParametrization(format!(
                "code {other}"
            ))),
        }
    }

    /// Project a measured four-momentum into this basis.
    ///
    /// Arguments
    /// -----------------
    /// * `measured`: the measured four-momentum.
    ///
    /// Return
    /// ----------
    /// * `(y, reference)` – the starting parameter vector and the fixed reference quantities,
    ///   or a short reason when the basis is degenerate at `measured` (the caller wraps it
    ///   into [`KinFitError::DegenerateParametrization`]).
    pub(crate) fn project(
        &self,
        measured: &FourMomentum,
    ) -> Result<(DVector<f64>, ParamReference), &'static str> {
        let p = measured.p();
        let pt = measured.pt();
        let reference = ParamReference {
            mass: measured.m2().max(0.0).sqrt(),
            momentum: p,
        };

        let y = match self {
            Parametrization::EtEtaPhi | Parametrization::EtThetaPhi if pt < MOMENTUM_EPS => {
                return Err("zero transverse momentum");
            }
            Parametrization::InvPThetaPhi
            | Parametrization::EMomDev
            | Parametrization::EScaledMomDev
                if p < MOMENTUM_EPS =>
            {
                return Err("zero momentum");
            }
            Parametrization::EtEtaPhi => {
                let eta = measured.eta();
                DVector::from_vec(vec![measured.e() / eta.cosh(), eta, measured.phi()])
            }
            Parametrization::EtThetaPhi => {
                let theta = measured.theta();
                DVector::from_vec(vec![measured.e() * theta.sin(), theta, measured.phi()])
            }
            Parametrization::InvPThetaPhi => {
                DVector::from_vec(vec![1.0 / p, measured.theta(), measured.phi()])
            }
            Parametrization::EMomDev => {
                DVector::from_vec(vec![1.0 / p, measured.theta(), measured.phi(), 1.0])
            }
            Parametrization::EScaledMomDev => {
                DVector::from_vec(vec![1.0, measured.theta(), measured.phi()])
            }
        };

        Ok((y, reference))
    }

    /// Four-momentum implied by the parameter vector `y`.
    pub(crate) fn four_momentum(&self, y: &DVector<f64>, reference: &ParamReference) -> FourMomentum {
        let m = reference.mass;
        match self {
            Parametrization::EtEtaPhi => {
                let (et, eta, phi) = (y[0], y[1], y[2]);
                let e = et * eta.cosh();
                let pt = on_shell_momentum(e, m) / eta.cosh();
                FourMomentum::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh(), e)
            }
            Parametrization::EtThetaPhi => {
                let (et, theta, phi) = (y[0], y[1], y[2]);
                let e = et / theta.sin();
                spherical(on_shell_momentum(e, m), theta, phi, e)
            }
            Parametrization::InvPThetaPhi => {
                let p = 1.0 / y[0];
                spherical(p, y[1], y[2], p.hypot(m))
            }
            Parametrization::EMomDev => {
                let p = 1.0 / y[0];
                spherical(p, y[1], y[2], y[3] * p.hypot(m))
            }
            Parametrization::EScaledMomDev => {
                let p = y[0] * reference.momentum;
                spherical(p, y[1], y[2], p.hypot(m))
            }
        }
    }

    /// Jacobian `∂(px, py, pz, E)/∂y`, a `4 × n_params` matrix evaluated at `y`.
    ///
    /// Where the basis becomes singular (e.g. an energy falling below the fixed mass) the
    /// entries are non-finite; the fit engine turns that into a numerical failure.
    pub(crate) fn jacobian(&self, y: &DVector<f64>, reference: &ParamReference) -> DMatrix<f64> {
        let m = reference.mass;
        let mut jac = DMatrix::zeros(4, self.n_params());

        match self {
            Parametrization::EtEtaPhi => {
                let (et, eta, phi) = (y[0], y[1], y[2]);
                let (ch, sh, th) = (eta.cosh(), eta.sinh(), eta.tanh());
                let (cp, sp) = (phi.cos(), phi.sin());
                let e = et * ch;
                let p = on_shell_momentum(e, m);
                let pt = p / ch;
                let r = e / p;

                let dpt_det = r;
                let dpt_deta = th * (r * et - pt);

                jac[(0, 0)] = dpt_det * cp;
                jac[(0, 1)] = dpt_deta * cp;
                jac[(0, 2)] = -pt * sp;

                jac[(1, 0)] = dpt_det * sp;
                jac[(1, 1)] = dpt_deta * sp;
                jac[(1, 2)] = pt * cp;

                jac[(2, 0)] = r * sh;
                jac[(2, 1)] = r * et * sh * th + p / (ch * ch);

                jac[(3, 0)] = ch;
                jac[(3, 1)] = et * sh;
            }
            Parametrization::EtThetaPhi => {
                let (et, theta, phi) = (y[0], y[1], y[2]);
                let (st, ct) = (theta.sin(), theta.cos());
                let (cp, sp) = (phi.cos(), phi.sin());
                let e = et / st;
                let p = on_shell_momentum(e, m);
                let r = e / p;

                let de_det = 1.0 / st;
                let de_dth = -et * ct / (st * st);
                let dp_det = r * de_det;
                let dp_dth = r * de_dth;
                let dpt_dth = dp_dth * st + p * ct;

                jac[(0, 0)] = dp_det * st * cp;
                jac[(0, 1)] = dpt_dth * cp;
                jac[(0, 2)] = -p * st * sp;

                jac[(1, 0)] = dp_det * st * sp;
                jac[(1, 1)] = dpt_dth * sp;
                jac[(1, 2)] = p * st * cp;

                jac[(2, 0)] = dp_det * ct;
                jac[(2, 1)] = dp_dth * ct - p * st;

                jac[(3, 0)] = de_det;
                jac[(3, 1)] = de_dth;
            }
            Parametrization::InvPThetaPhi | Parametrization::EMomDev => {
                let p = 1.0 / y[0];
                let dp_dq = -p * p;
                fill_angular_block(&mut jac, p, dp_dq, y[1], y[2]);

                let e0 = p.hypot(m);
                let scale = if *self == Parametrization::EMomDev {
                    jac[(3, 3)] = e0;
                    y[3]
                } else {
                    1.0
                };
                jac[(3, 0)] = scale * p / e0 * dp_dq;
            }
            Parametrization::EScaledMomDev => {
                let p0 = reference.momentum;
                let p = y[0] * p0;
                fill_angular_block(&mut jac, p, p0, y[1], y[2]);
                jac[(3, 0)] = p / p.hypot(m) * p0;
            }
        }

        jac
    }
}

/// `sqrt(E² − m²)`, clamped at zero below the mass shell.
fn on_shell_momentum(e: f64, m: f64) -> f64 {
    (e * e - m * m).max(0.0).sqrt()
}

fn spherical(p: f64, theta: f64, phi: f64, e: f64) -> FourMomentum {
    let st = theta.sin();
    FourMomentum::new(p * st * phi.cos(), p * st * phi.sin(), p * theta.cos(), e)
}

/// Rows `px, py, pz` of a `(magnitude, θ, φ, …)` basis, with `dp` the derivative of `|p|`
/// with respect to the magnitude parameter.
fn fill_angular_block(jac: &mut DMatrix<f64>, p: f64, dp: f64, theta: f64, phi: f64) {
    let (st, ct) = (theta.sin(), theta.cos());
    let (cp, sp) = (phi.cos(), phi.sin());

    jac[(0, 0)] = dp * st * cp;
    jac[(0, 1)] = p * ct * cp;
    jac[(0, 2)] = -p * st * sp;

    jac[(1, 0)] = dp * st * sp;
    jac[(1, 1)] = p * ct * sp;
    jac[(1, 2)] = p * st * cp;

    jac[(2, 0)] = dp * ct;
    jac[(2, 1)] = -p * st;
}

impl fmt::Display for Parametrization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parametrization::EtEtaPhi => "EtEtaPhi",
            Parametrization::EtThetaPhi => "EtThetaPhi",
            Parametrization::InvPThetaPhi => "InvPThetaPhi",
            Parametrization::EMomDev => "EMomDev",
            Parametrization::EScaledMomDev => "EScaledMomDev",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Parametrization {
    type Err = KinFitError;

    /// Accepts both `EtEtaPhi` and `et_eta_phi` spellings, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        Parametrization::ALL
            .into_iter()
            .find(|p| p.to_string().to_ascii_lowercase() == key)
            .ok_or_else(|| KinFitError::UnsupportedParametrization(s.to_string()))
    }
}

#[cfg(test)]
mod parametrization_tests {
    use super::*;
    use approx::assert_relative_eq;

    fn samples() -> Vec<FourMomentum> {
        vec![
            FourMomentum::from_pt_eta_phi_m(45.0, 0.4, 1.1, 0.0),
            FourMomentum::from_pt_eta_phi_m(62.0, -1.7, -2.6, 4.8),
            FourMomentum::from_pt_eta_phi_m(28.0, 2.1, 0.2, 10.5),
            FourMomentum::from_pt_eta_phi_m(33.0, 0.0, 3.0, 0.105),
        ]
    }

    fn numerical_jacobian(
        param: Parametrization,
        y: &DVector<f64>,
        reference: &ParamReference,
    ) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(4, param.n_params());
        for k in 0..param.n_params() {
            let h = 1e-6 * y[k].abs().max(1e-3);
            let mut up = y.clone();
            let mut down = y.clone();
            up[k] += h;
            down[k] -= h;
            let diff = (param.four_momentum(&up, reference).to_vector()
                - param.four_momentum(&down, reference).to_vector())
                / (2.0 * h);
            jac.set_column(k, &diff);
        }
        jac
    }

    #[test]
    fn test_projection_roundtrip() {
        for param in Parametrization::ALL {
            for p in samples() {
                let (y, reference) = param.project(&p).unwrap();
                assert_eq!(y.len(), param.n_params());
                let back = param.four_momentum(&y, &reference);
                assert_relative_eq!(back.to_vector(), p.to_vector(), epsilon = 1e-9, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_analytic_jacobian_matches_finite_differences() {
        for param in Parametrization::ALL {
            for p in samples() {
                let (mut y, reference) = param.project(&p).unwrap();
                // move away from the projection point so off-shell terms are exercised
                y[1] += 0.05;
                y[2] -= 0.1;
                if param == Parametrization::EMomDev {
                    y[3] = 1.07;
                }

                let analytic = param.jacobian(&y, &reference);
                let numeric = numerical_jacobian(param, &y, &reference);
                for i in 0..4 {
                    for k in 0..param.n_params() {
                        assert_relative_eq!(
                            analytic[(i, k)],
                            numeric[(i, k)],
                            epsilon = 1e-5,
                            max_relative = 1e-5
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_mass_is_preserved_by_fixed_mass_bases() {
        let p = FourMomentum::from_pt_eta_phi_m(50.0, 0.7, -0.4, 4.8);
        for param in [
            Parametrization::EtEtaPhi,
            Parametrization::EtThetaPhi,
            Parametrization::InvPThetaPhi,
            Parametrization::EScaledMomDev,
        ] {
            let (mut y, reference) = param.project(&p).unwrap();
            y[0] *= 1.1;
            y[1] += 0.02;
            let moved = param.four_momentum(&y, &reference);
            assert_relative_eq!(moved.m(), 4.8, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_emomdev_scale_changes_mass() {
        let p = FourMomentum::from_pt_eta_phi_m(40.0, 0.0, 0.0, 0.0);
        let (mut y, reference) = Parametrization::EMomDev.project(&p).unwrap();
        assert_eq!(y[3], 1.0);
        y[3] = 1.25;
        let moved = Parametrization::EMomDev.four_momentum(&y, &reference);
        assert_relative_eq!(moved.e(), 50.0, epsilon = 1e-12);
        assert_relative_eq!(moved.m(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_projections() {
        let beam = FourMomentum::new(0.0, 0.0, 30.0, 30.0);
        assert!(Parametrization::EtEtaPhi.project(&beam).is_err());
        assert!(Parametrization::EtThetaPhi.project(&beam).is_err());
        assert!(Parametrization::InvPThetaPhi.project(&beam).is_ok());

        let at_rest = FourMomentum::new(0.0, 0.0, 0.0, 5.0);
        for param in Parametrization::ALL {
            assert!(param.project(&at_rest).is_err());
        }
    }

    #[test]
    fn test_parse_and_codes() {
        assert_eq!(
            "et_eta_phi".parse::<Parametrization>().unwrap(),
            Parametrization::EtEtaPhi
        );
        assert_eq!(
            "EScaledMomDev".parse::<Parametrization>().unwrap(),
            Parametrization::EScaledMomDev
        );
        assert_eq!(
            "inv_p_theta_phi".parse::<Parametrization>().unwrap(),
            Parametrization::InvPThetaPhi
        );
        assert!("spherical".parse::<Parametrization>().is_err());

        assert_eq!(Parametrization::from_code(0), Ok(Parametrization::EMomDev));
        assert_eq!(Parametrization::from_code(1), Ok(Parametrization::EtEtaPhi));
        assert_eq!(Parametrization::from_code(2), Ok(Parametrization::EtThetaPhi));
        assert_eq!(
            Parametrization::from_code(7),
            Err(KinFitError::UnsupportedParametrization("code 7".into()))
        );
    }
}
