//! # Constants and type definitions for kinfit
//!
//! This module centralizes the **physical constants**, the **default fit settings**
//! and the **numerical thresholds** used throughout the crate.
//!
//! ## Overview
//!
//! - Reference masses used by the top-quark decay hypotheses
//! - Default iteration cap and convergence thresholds of the Newton–Lagrange loop
//! - Tolerances for covariance validation and singularity detection
//! - Type aliases naming the physical units flowing through the API
//!
//! Masses are expressed in GeV, angles in radians.

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// Reference W-boson mass (GeV)
pub const W_MASS: GeV = 80.4;

/// Reference top-quark mass (GeV)
///
/// Close to the measured world average. Older hypothesis setups used 175 GeV; set
/// `TopFitConfig::top_mass` to reproduce them.
pub const TOP_MASS: GeV = 173.0;

// -------------------------------------------------------------------------------------------------
// Default fit settings
// -------------------------------------------------------------------------------------------------

/// Default maximum number of Newton–Lagrange iterations
pub const DEFAULT_MAX_NR_ITER: usize = 200;

/// Default convergence threshold on the change of the fit statistic S between iterations
pub const DEFAULT_MAX_DELTA_S: f64 = 5e-5;

/// Default convergence threshold on the total constraint violation F = Σ|fᵢ|
pub const DEFAULT_MAX_F: f64 = 1e-4;

// -------------------------------------------------------------------------------------------------
// Numerical thresholds
// -------------------------------------------------------------------------------------------------

/// Reciprocal condition number below which a matrix is treated as singular
pub const SINGULAR_RCOND: f64 = 1e-14;

/// Relative tolerance for the symmetry and positive semi-definiteness checks of covariances
pub const COVARIANCE_TOL: f64 = 1e-9;

/// Below this magnitude a transverse or total momentum is considered zero
pub const MOMENTUM_EPS: f64 = 1e-9;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Energy, momentum or mass in GeV
pub type GeV = f64;
/// Angle in radians
pub type Radian = f64;
/// Pseudorapidity (dimensionless)
pub type Eta = f64;
