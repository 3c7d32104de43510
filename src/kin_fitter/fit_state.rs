//! Linearized constraint system and per-iteration state of the Newton–Lagrange loop.
//!
//! All particles' free parameters are stacked into one vector `y` of length `n`, in
//! registration order. With `m` constraints the linearization at `y` gives
//!
//! * `f` – the residual vector (`m`),
//! * `B` – the stacked gradient `∂f/∂y` (`m × n`).
//!
//! Each step solves the KKT system
//!
//! ```text
//! [ W  Bᵀ ] [ Δ ]   [ −W (y − y₀) ]
//! [ B  0  ] [ λ ] = [ −f          ]
//! ```
//!
//! where `W` is the block-diagonal of the inverse measurement covariances.

use nalgebra::{DMatrix, DVector};

use crate::{
    constraints::Constraint,
    fit_particle::FitParticle,
    kinfit_errors::KinFitError,
    linalg::{checked_inverse, symmetrize},
};

/// Offset of every particle's block in the stacked parameter vector.
pub(crate) fn parameter_offsets(particles: &[FitParticle]) -> Vec<usize> {
    particles
        .iter()
        .scan(0, |offset, p| {
            let start = *offset;
            *offset += p.n_params();
            Some(start)
        })
        .collect()
}

/// Residuals and stacked gradient of all constraints at the current iterate.
#[derive(Debug, Clone)]
pub(crate) struct Linearization {
    pub residuals: DVector<f64>,
    pub jacobian: DMatrix<f64>,
}

impl Linearization {
    pub(crate) fn evaluate(
        constraints: &[Constraint],
        particles: &[FitParticle],
        offsets: &[usize],
        n_params: usize,
    ) -> Result<Self, KinFitError> {
        let m = constraints.len();
        let mut residuals = DVector::zeros(m);
        let mut jacobian = DMatrix::zeros(m, n_params);

        for (row, c) in constraints.iter().enumerate() {
            residuals[row] = c.residual(particles)?;
            for (id, grad) in c.gradient(particles)? {
                let start = offsets[id.index()];
                for (k, g) in grad.iter().enumerate() {
                    jacobian[(row, start + k)] += g;
                }
            }
        }

        Ok(Linearization {
            residuals,
            jacobian,
        })
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.residuals.iter().all(|x| x.is_finite()) && self.jacobian.iter().all(|x| x.is_finite())
    }

    /// Total constraint violation `F = Σ|fᵢ|`.
    pub(crate) fn violation(&self) -> f64 {
        self.residuals.iter().map(|f| f.abs()).sum()
    }
}

/// Transient state of one iteration.
#[derive(Debug, Clone)]
pub(crate) struct FitState {
    /// Stacked deviation `y − y₀`.
    pub deviation: DVector<f64>,
    /// Lagrange multipliers of the last step.
    pub lambda: DVector<f64>,
    /// Fit statistic `S`.
    pub s: f64,
    /// Constraint violation `F`.
    pub f: f64,
}

impl FitState {
    pub(crate) fn at_measurement(n_params: usize, n_constraints: usize, f: f64) -> Self {
        FitState {
            deviation: DVector::zeros(n_params),
            lambda: DVector::zeros(n_constraints),
            s: 0.0,
            f,
        }
    }
}

/// Stack the deviations `y − y₀` of all particles.
pub(crate) fn stacked_deviation(
    particles: &[FitParticle],
    n_params: usize,
) -> Result<DVector<f64>, KinFitError> {
    let mut out = DVector::zeros(n_params);
    let mut offset = 0;
    for p in particles {
        let d = p.deviation()?;
        out.rows_mut(offset, d.len()).copy_from(&d);
        offset += d.len();
    }
    Ok(out)
}

/// Fit statistic `S = dᵀ W d`.
pub(crate) fn chi2(weight: &DMatrix<f64>, deviation: &DVector<f64>) -> f64 {
    deviation.dot(&(weight * deviation))
}

/// Assemble the KKT normal matrix `[[W, Bᵀ], [B, 0]]`.
pub(crate) fn normal_matrix(weight: &DMatrix<f64>, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
    let n = weight.nrows();
    let m = jacobian.nrows();
    let mut k = DMatrix::zeros(n + m, n + m);
    k.view_mut((0, 0), (n, n)).copy_from(weight);
    k.view_mut((n, 0), (m, n)).copy_from(jacobian);
    k.view_mut((0, n), (n, m)).copy_from(&jacobian.transpose());
    k
}

/// Solve one Newton–Lagrange step.
///
/// Arguments
/// -----------------
/// * `weight`: block-diagonal inverse covariance `W` (`n × n`).
/// * `lin`: linearization at the current iterate.
/// * `deviation`: stacked `y − y₀`.
///
/// Return
/// ----------
/// * `Some((Δ, λ))`, or `None` when the normal matrix is singular.
pub(crate) fn solve_step(
    weight: &DMatrix<f64>,
    lin: &Linearization,
    deviation: &DVector<f64>,
) -> Option<(DVector<f64>, DVector<f64>)> {
    let n = weight.nrows();
    let m = lin.residuals.len();

    let k_inv = checked_inverse(&normal_matrix(weight, &lin.jacobian))?;

    let mut rhs = DVector::zeros(n + m);
    rhs.rows_mut(0, n).copy_from(&(-(weight * deviation)));
    rhs.rows_mut(n, m).copy_from(&(-&lin.residuals));

    let sol = k_inv * rhs;
    let delta = sol.rows(0, n).into_owned();
    let lambda = sol.rows(n, m).into_owned();
    Some((delta, lambda))
}

/// Covariance of the fitted parameters, the top-left `n × n` block of the inverse normal
/// matrix (`V − VBᵀ(BVBᵀ)⁻¹BV`).
pub(crate) fn fitted_covariance(
    weight: &DMatrix<f64>,
    jacobian: &DMatrix<f64>,
) -> Option<DMatrix<f64>> {
    let n = weight.nrows();
    let k_inv = checked_inverse(&normal_matrix(weight, jacobian))?;
    Some(symmetrize(&k_inv.view((0, 0), (n, n)).into_owned()))
}

#[cfg(test)]
mod fit_state_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_linear_constraint_step() {
        // Two measurements of the same quantity, constrained to be equal.
        let weight = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0 / 4.0]));
        let lin = Linearization {
            residuals: DVector::from_vec(vec![10.0 - 13.0]),
            jacobian: DMatrix::from_row_slice(1, 2, &[1.0, -1.0]),
        };
        let (delta, lambda) = solve_step(&weight, &lin, &DVector::zeros(2)).unwrap();

        // Weighted average of 10 ± 1 and 13 ± 2 is 10.6.
        assert_relative_eq!(10.0 + delta[0], 10.6, epsilon = 1e-12);
        assert_relative_eq!(13.0 + delta[1], 10.6, epsilon = 1e-12);
        assert_eq!(lambda.len(), 1);

        let cov = fitted_covariance(&weight, &lin.jacobian).unwrap();
        // Variance of the weighted average: 1 / (1 + 1/4) = 0.8.
        assert_relative_eq!(cov[(0, 0)], 0.8, epsilon = 1e-12);
        assert_relative_eq!(cov[(1, 1)], 0.8, epsilon = 1e-12);
        assert_relative_eq!(cov[(0, 1)], 0.8, epsilon = 1e-12);

        let s = chi2(&weight, &delta);
        assert_relative_eq!(s, 0.36 + 2.4 * 2.4 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_gradient_is_singular() {
        let weight = DMatrix::identity(3, 3);
        let lin = Linearization {
            residuals: DVector::from_vec(vec![1.0]),
            jacobian: DMatrix::zeros(1, 3),
        };
        assert!(solve_step(&weight, &lin, &DVector::zeros(3)).is_none());
        assert!(fitted_covariance(&weight, &lin.jacobian).is_none());
    }

    #[test]
    fn test_normal_matrix_layout() {
        let weight = DMatrix::from_diagonal_element(2, 2, 3.0);
        let b = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let k = normal_matrix(&weight, &b);
        assert_eq!(
            k,
            DMatrix::from_row_slice(3, 3, &[3.0, 0.0, 1.0, 0.0, 3.0, 2.0, 1.0, 2.0, 0.0])
        );
    }
}
