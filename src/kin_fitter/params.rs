//! # Fit parameters
//!
//! [`FitParams`] gathers the tunable settings of the Newton–Lagrange loop run by
//! [`KinFitter::fit`](crate::kin_fitter::KinFitter::fit):
//!
//! - `max_nr_iter` – iteration cap, after which the fit stops with
//!   [`FitStatus::MaxIterationsReached`](crate::kin_fitter::fit_result::FitStatus::MaxIterationsReached),
//! - `max_delta_s` – convergence threshold on `|S − S_prev|`,
//! - `max_f` – convergence threshold on the total constraint violation `F = Σ|fᵢ|`,
//! - `verbosity` – 0 is silent, 1 logs numerical failures, 2 logs every iteration.
//!
//! Both thresholds must be met in the same iteration for the fit to converge.
//!
//! ## Example
//!
//! ```rust
//! use kinfit::kin_fitter::FitParams;
//!
//! let params = FitParams::builder()
//!     .max_nr_iter(50)
//!     .max_f(1e-5)
//!     .build()
//!     .unwrap();
//!
//! println!("{params:#}");
//! ```

use std::cmp::Ordering::Greater;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_MAX_DELTA_S, DEFAULT_MAX_F, DEFAULT_MAX_NR_ITER},
    kinfit_errors::KinFitError,
};

/// Configuration of the Newton–Lagrange iteration.
///
/// The [`Default`] implementation gives the settings used by the top-quark fitters:
/// 200 iterations, `max_delta_s = 5e-5`, `max_f = 1e-4`, silent.
///
/// See also
/// ------------
/// * [`FitParamsBuilder`] – Validated construction.
/// * [`KinFitter::new`](crate::kin_fitter::KinFitter::new) – Consumer of these parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitParams {
    /// Maximum number of iterations (≥ 1).
    pub max_nr_iter: usize,
    /// Convergence threshold on the change of the fit statistic S (> 0).
    pub max_delta_s: f64,
    /// Convergence threshold on the summed absolute constraint residuals (> 0).
    pub max_f: f64,
    /// Logging level of the engine.
    pub verbosity: u8,
}

impl FitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> FitParamsBuilder {
        FitParamsBuilder::new()
    }
}

impl Default for FitParams {
    fn default() -> Self {
        FitParams {
            max_nr_iter: DEFAULT_MAX_NR_ITER,
            max_delta_s: DEFAULT_MAX_DELTA_S,
            max_f: DEFAULT_MAX_F,
            verbosity: 0,
        }
    }
}

/// Builder for [`FitParams`], with validation.
#[derive(Debug, Clone)]
pub struct FitParamsBuilder {
    params: FitParams,
}

impl Default for FitParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FitParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: FitParams::default(),
        }
    }

    pub fn max_nr_iter(mut self, v: usize) -> Self {
        self.params.max_nr_iter = v;
        self
    }
    pub fn max_delta_s(mut self, v: f64) -> Self {
        self.params.max_delta_s = v;
        self
    }
    pub fn max_f(mut self, v: f64) -> Self {
        self.params.max_f = v;
        self
    }
    pub fn verbosity(mut self, v: u8) -> Self {
        self.params.verbosity = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Finalize the builder and produce a [`FitParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `max_nr_iter >= 1`
    /// * `max_delta_s > 0.0` and finite
    /// * `max_f > 0.0` and finite
    ///
    /// Returns
    /// -----------------
    /// * `Ok(FitParams)` if all values are valid.
    /// * `Err(KinFitError::InvalidFitParameter)` naming the first offending field otherwise.
    pub fn build(self) -> Result<FitParams, KinFitError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl FitParams {
    /// Apply the [`FitParamsBuilder::build`] rules to an already constructed value,
    /// e.g. one obtained through deserialization.
    pub fn validate(&self) -> Result<(), KinFitError> {
        if self.max_nr_iter == 0 {
            return Err(KinFitError::InvalidFitParameter(
                "max_nr_iter must be >= 1".into(),
            ));
        }
        if !FitParamsBuilder::gt0(self.max_delta_s) || !self.max_delta_s.is_finite() {
            return Err(KinFitError::InvalidFitParameter(
                "max_delta_s must be finite and > 0".into(),
            ));
        }
        if !FitParamsBuilder::gt0(self.max_f) || !self.max_f.is_finite() {
            return Err(KinFitError::InvalidFitParameter(
                "max_f must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for FitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 32;
            writeln!(f, "Kinematic Fit Parameters")?;
            writeln!(f, "------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!(
                "max_nr_iter = {}",
                self.max_nr_iter,
                "Maximum number of iterations"
            )?;
            line!(
                "max_delta_s = {:.3e}",
                self.max_delta_s,
                "Convergence threshold on |S - S_prev|"
            )?;
            line!(
                "max_f       = {:.3e}",
                self.max_f,
                "Convergence threshold on sum |f_i|"
            )?;
            line!("verbosity   = {}", self.verbosity, "Logging level (0-2)")
        } else {
            write!(
                f,
                "FitParams(max_nr_iter={}, max_delta_s={:.1e}, max_f={:.1e}, verbosity={})",
                self.max_nr_iter, self.max_delta_s, self.max_f, self.verbosity
            )
        }
    }
}
