//! # Four-momentum value type
//!
//! [`FourMomentum`] is the immutable Cartesian `(px, py, pz, E)` representation used at
//! every boundary of the crate: measurements come in as four-momenta, fitted particles go
//! out as four-momenta, and constraints are evaluated on sums of them.
//!
//! Derived collider quantities (`pT`, `E_T`, mass, `η`, `φ`, `θ`) are computed on demand.
//!
//! ## Conventions
//!
//! - Units are GeV and radians.
//! - The mass is **signed**: for space-like vectors (`m² < 0`) [`FourMomentum::m`] returns
//!   `-sqrt(-m²)`, so that small negative values produced by rounding stay continuous.
//! - Pseudorapidity of a vector along the beam axis is `±∞`, and `0` for the null vector.
//!
//! ```rust
//! use kinfit::four_momentum::FourMomentum;
//!
//! let jet = FourMomentum::from_pt_eta_phi_m(45.0, 0.3, 1.2, 5.0);
//! let lep = FourMomentum::from_pt_eta_phi_m(30.0, -0.8, -2.0, 0.0);
//! let pair = jet + lep;
//! println!("m(jet, lep) = {:.2} GeV", pair.m());
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::Vector4;

use crate::constants::{Eta, GeV, Radian};

/// Cartesian four-momentum `(px, py, pz, E)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FourMomentum {
    px: GeV,
    py: GeV,
    pz: GeV,
    e: GeV,
}

impl FourMomentum {
    pub fn new(px: GeV, py: GeV, pz: GeV, e: GeV) -> Self {
        FourMomentum { px, py, pz, e }
    }

    /// Build a four-momentum from collider coordinates.
    ///
    /// Arguments
    /// -----------------
    /// * `pt`: transverse momentum (GeV)
    /// * `eta`: pseudorapidity
    /// * `phi`: azimuthal angle (rad)
    /// * `m`: mass (GeV), the energy is `sqrt(p² + m²)`
    ///
    /// Return
    /// ----------
    /// * The corresponding Cartesian [`FourMomentum`].
    pub fn from_pt_eta_phi_m(pt: GeV, eta: Eta, phi: Radian, m: GeV) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        FourMomentum::new(px, py, pz, (p2 + m * m).sqrt())
    }

    pub fn from_vector(v: &Vector4<f64>) -> Self {
        FourMomentum::new(v[0], v[1], v[2], v[3])
    }

    /// Components ordered as `(px, py, pz, E)`, the row order of every Jacobian in the crate.
    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(self.px, self.py, self.pz, self.e)
    }

    pub fn px(&self) -> GeV {
        self.px
    }

    pub fn py(&self) -> GeV {
        self.py
    }

    pub fn pz(&self) -> GeV {
        self.pz
    }

    pub fn e(&self) -> GeV {
        self.e
    }

    pub fn p2(&self) -> f64 {
        self.px * self.px + self.py * self.py + self.pz * self.pz
    }

    /// Magnitude of the three-momentum.
    pub fn p(&self) -> GeV {
        self.p2().sqrt()
    }

    pub fn pt(&self) -> GeV {
        self.px.hypot(self.py)
    }

    /// Transverse energy `E sinθ`.
    pub fn et(&self) -> GeV {
        let p = self.p();
        if p == 0.0 {
            0.0
        } else {
            self.e * self.pt() / p
        }
    }

    pub fn m2(&self) -> f64 {
        self.e * self.e - self.p2()
    }

    /// Signed invariant mass, negative for space-like vectors.
    pub fn m(&self) -> GeV {
        let m2 = self.m2();
        if m2 < 0.0 {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }

    pub fn phi(&self) -> Radian {
        if self.px == 0.0 && self.py == 0.0 {
            0.0
        } else {
            self.py.atan2(self.px)
        }
    }

    /// Polar angle with respect to the beam (z) axis, in `[0, π]`.
    pub fn theta(&self) -> Radian {
        self.pt().atan2(self.pz)
    }

    pub fn eta(&self) -> Eta {
        let pt = self.pt();
        if pt == 0.0 {
            if self.pz == 0.0 {
                0.0
            } else {
                self.pz.signum() * f64::INFINITY
            }
        } else {
            (self.pz / pt).asinh()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.px.is_finite() && self.py.is_finite() && self.pz.is_finite() && self.e.is_finite()
    }
}

impl Add for FourMomentum {
    type Output = FourMomentum;

    fn add(self, rhs: FourMomentum) -> FourMomentum {
        FourMomentum::new(
            self.px + rhs.px,
            self.py + rhs.py,
            self.pz + rhs.pz,
            self.e + rhs.e,
        )
    }
}

impl Sub for FourMomentum {
    type Output = FourMomentum;

    fn sub(self, rhs: FourMomentum) -> FourMomentum {
        self + (-rhs)
    }
}

impl Neg for FourMomentum {
    type Output = FourMomentum;

    fn neg(self) -> FourMomentum {
        FourMomentum::new(-self.px, -self.py, -self.pz, -self.e)
    }
}

impl Mul<f64> for FourMomentum {
    type Output = FourMomentum;

    fn mul(self, k: f64) -> FourMomentum {
        FourMomentum::new(self.px * k, self.py * k, self.pz * k, self.e * k)
    }
}

impl Sum for FourMomentum {
    fn sum<I: Iterator<Item = FourMomentum>>(iter: I) -> FourMomentum {
        iter.fold(FourMomentum::default(), |acc, p| acc + p)
    }
}

impl fmt::Display for FourMomentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(
                f,
                "(pT={:.3}, eta={:.4}, phi={:.4}, m={:.3})",
                self.pt(),
                self.eta(),
                self.phi(),
                self.m()
            )
        } else {
            write!(
                f,
                "(px={:.3}, py={:.3}, pz={:.3}, E={:.3})",
                self.px, self.py, self.pz, self.e
            )
        }
    }
}

#[cfg(test)]
mod four_momentum_tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_collider_coordinates_roundtrip() {
        let p = FourMomentum::from_pt_eta_phi_m(42.0, -1.3, 2.5, 4.8);
        assert_relative_eq!(p.pt(), 42.0, epsilon = 1e-12);
        assert_relative_eq!(p.eta(), -1.3, epsilon = 1e-12);
        assert_relative_eq!(p.phi(), 2.5, epsilon = 1e-12);
        assert_relative_eq!(p.m(), 4.8, epsilon = 1e-9);
    }

    #[test]
    fn test_signed_mass() {
        let spacelike = FourMomentum::new(3.0, 0.0, 4.0, 3.0);
        assert_relative_eq!(spacelike.m2(), -16.0);
        assert_relative_eq!(spacelike.m(), -4.0);

        let massless = FourMomentum::new(0.0, 3.0, 4.0, 5.0);
        assert_eq!(massless.m(), 0.0);
    }

    #[test]
    fn test_beam_axis_angles() {
        let forward = FourMomentum::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(forward.eta(), f64::INFINITY);
        assert_eq!(forward.theta(), 0.0);

        let backward = FourMomentum::new(0.0, 0.0, -10.0, 10.0);
        assert_eq!(backward.eta(), f64::NEG_INFINITY);
        assert_relative_eq!(backward.theta(), PI);

        assert_eq!(FourMomentum::default().eta(), 0.0);
        assert_eq!(FourMomentum::default().phi(), 0.0);
    }

    #[test]
    fn test_transverse_energy() {
        let p = FourMomentum::from_pt_eta_phi_m(20.0, 0.0, 0.3, 0.0);
        assert_relative_eq!(p.et(), 20.0, epsilon = 1e-12);

        let q = FourMomentum::from_pt_eta_phi_m(20.0, 1.0, 0.3, 0.0);
        assert_relative_eq!(q.et(), q.e() / 1.0_f64.cosh(), epsilon = 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        let a = FourMomentum::new(1.0, 2.0, 3.0, 10.0);
        let b = FourMomentum::new(-1.0, 0.5, 2.0, 5.0);

        assert_eq!(a + b, FourMomentum::new(0.0, 2.5, 5.0, 15.0));
        assert_eq!(a - b, FourMomentum::new(2.0, 1.5, 1.0, 5.0));
        assert_eq!(-a * 2.0, FourMomentum::new(-2.0, -4.0, -6.0, -20.0));
        assert_eq!(vec![a, b, a].into_iter().sum::<FourMomentum>(), a + b + a);
        assert_eq!(FourMomentum::from_vector(&a.to_vector()), a);
    }

    #[test]
    fn test_display() {
        let a = FourMomentum::new(1.0, 2.0, 3.0, 10.0);
        assert_eq!(
            format!("{a}"),
            "(px=1.000, py=2.000, pz=3.000, E=10.000)"
        );
        assert!(format!("{a:#}").starts_with("(pT=2.236"));
    }
}
