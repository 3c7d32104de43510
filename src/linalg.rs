//! Small dense linear-algebra helpers shared by the particle and engine layers.

use nalgebra::{DMatrix, SymmetricEigen};

use crate::constants::{COVARIANCE_TOL, SINGULAR_RCOND};

/// Invert a square matrix, refusing ill-conditioned or non-finite input.
///
/// The reciprocal condition number is estimated from the singular values; below
/// [`SINGULAR_RCOND`] the matrix is considered singular even when an LU factorization
/// would still produce (meaningless) pivots.
///
/// Return
/// ----------
/// * `Some(inverse)` for a well-conditioned matrix, `None` otherwise.
pub(crate) fn checked_inverse(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if m.nrows() != m.ncols() || m.iter().any(|x| !x.is_finite()) {
        return None;
    }
    if m.is_empty() {
        return Some(m.clone());
    }

    let sv = m.clone().singular_values();
    let max = sv.max();
    let min = sv.min();
    if max <= 0.0 || min / max < SINGULAR_RCOND {
        return None;
    }

    let inv = m.clone().try_inverse()?;
    inv.iter().all(|x| x.is_finite()).then_some(inv)
}

/// Block-diagonal assembly of square blocks.
pub(crate) fn block_diagonal(blocks: &[DMatrix<f64>]) -> DMatrix<f64> {
    let n: usize = blocks.iter().map(|b| b.nrows()).sum();
    let mut out = DMatrix::zeros(n, n);
    let mut offset = 0;
    for b in blocks {
        let k = b.nrows();
        out.view_mut((offset, offset), (k, k)).copy_from(b);
        offset += k;
    }
    out
}

/// Average a matrix with its transpose to remove rounding asymmetry.
pub(crate) fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Reasons a covariance matrix is rejected at initialization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CovarianceDefect {
    NonFinite,
    Asymmetric,
    NotPositiveSemiDefinite(f64),
}

impl std::fmt::Display for CovarianceDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CovarianceDefect::NonFinite => write!(f, "contains non-finite entries"),
            CovarianceDefect::Asymmetric => write!(f, "is not symmetric"),
            CovarianceDefect::NotPositiveSemiDefinite(ev) => {
                write!(f, "is not positive semi-definite (eigenvalue {ev:e})")
            }
        }
    }
}

/// Check that `cov` is finite, symmetric and positive semi-definite.
///
/// Tolerances are [`COVARIANCE_TOL`] relative to the largest entry of `cov`, so that
/// variances of inverse momenta (down to `1e-10` and below) are checked at their own scale.
/// A negative variance is always rejected.
pub(crate) fn check_covariance(cov: &DMatrix<f64>) -> Result<(), CovarianceDefect> {
    if cov.iter().any(|x| !x.is_finite()) {
        return Err(CovarianceDefect::NonFinite);
    }
    if let Some(&v) = cov.diagonal().iter().find(|v| **v < 0.0) {
        return Err(CovarianceDefect::NotPositiveSemiDefinite(v));
    }

    let scale = cov.amax();
    for i in 0..cov.nrows() {
        for j in (i + 1)..cov.ncols() {
            if (cov[(i, j)] - cov[(j, i)]).abs() > COVARIANCE_TOL * scale {
                return Err(CovarianceDefect::Asymmetric);
            }
        }
    }

    let eigen = SymmetricEigen::new(symmetrize(cov));
    let lowest = eigen.eigenvalues.min();
    if lowest < -COVARIANCE_TOL * scale {
        return Err(CovarianceDefect::NotPositiveSemiDefinite(lowest));
    }
    Ok(())
}
