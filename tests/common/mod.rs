#![allow(dead_code)]

use std::f64::consts::PI;

use approx::assert_relative_eq;
use kinfit::fit_particle::Parametrization;
use kinfit::four_momentum::FourMomentum;
use kinfit::hypotheses::Measurement;
use nalgebra::{DMatrix, DVector};

pub fn diag(values: &[f64]) -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_row_slice(values))
}

/// Per-parameter resolutions of a jet-like object in `param`.
pub fn resolutions(param: Parametrization, p4: &FourMomentum) -> Vec<f64> {
    match param {
        Parametrization::EtEtaPhi | Parametrization::EtThetaPhi => vec![5.0, 0.05, 0.05],
        Parametrization::InvPThetaPhi => vec![0.1 / p4.p(), 0.05, 0.05],
        Parametrization::EMomDev => vec![0.1 / p4.p(), 0.05, 0.05, 0.1],
        Parametrization::EScaledMomDev => vec![0.1, 0.05, 0.05],
    }
}

pub fn measurement(param: Parametrization, p4: FourMomentum) -> Measurement {
    let sigma = resolutions(param, &p4);
    Measurement::with_resolutions(p4, &sigma)
}

/// Two massless objects at `η = 0` whose invariant mass is `mass`.
pub fn pair_at_mass(pt1: f64, pt2: f64, phi1: f64, mass: f64) -> (FourMomentum, FourMomentum) {
    let dphi = (1.0 - mass * mass / (2.0 * pt1 * pt2)).acos();
    (
        FourMomentum::from_pt_eta_phi_m(pt1, 0.0, phi1, 0.0),
        FourMomentum::from_pt_eta_phi_m(pt2, 0.0, phi1 + dphi, 0.0),
    )
}

/// Massless object at `η = 0`, recoiling against `system`, such that the total mass is `mass`.
pub fn recoil_at_mass(system: &FourMomentum, mass: f64) -> FourMomentum {
    let phi = system.phi() + PI;
    let denom = 2.0 * (system.e() - system.px() * phi.cos() - system.py() * phi.sin());
    let pt = (mass * mass - system.m2()) / denom;
    FourMomentum::from_pt_eta_phi_m(pt, 0.0, phi, 0.0)
}

/// Deterministic detector smearing: scale `pT`, shift `φ`.
pub fn smear(momenta: &[FourMomentum], scale: &[f64], dphi: &[f64]) -> Vec<FourMomentum> {
    momenta
        .iter()
        .zip(scale.iter().zip(dphi))
        .map(|(p, (k, d))| {
            FourMomentum::from_pt_eta_phi_m(p.pt() * k, p.eta(), p.phi() + d, p.m().max(0.0))
        })
        .collect()
}

pub const SMEAR_SCALE: [f64; 6] = [1.04, 0.95, 1.03, 0.97, 1.01, 1.1];
pub const SMEAR_DPHI: [f64; 6] = [0.02, -0.03, 0.01, 0.0, -0.02, 0.04];

/// Semi-leptonic `tt̄` at generator level: `HadB, HadP, HadQ, LepB, Lepton, Neutrino`.
pub fn semileptonic_event(w_mass: f64, top_mass: f64) -> Vec<FourMomentum> {
    let (p, q) = pair_at_mass(50.0, 40.0, 0.3, w_mass);
    let had_b = recoil_at_mass(&(p + q), top_mass);
    let (l, n) = pair_at_mass(50.0, 45.0, 2.0, w_mass);
    let lep_b = recoil_at_mass(&(l + n), top_mass);
    vec![had_b, p, q, lep_b, l, n]
}

/// Full-hadronic `tt̄` at generator level: `B, BBar, LightQ, LightQBar, LightP, LightPBar`.
pub fn fullhadronic_event(w_mass: f64, top_mass: f64) -> Vec<FourMomentum> {
    let (q, qbar) = pair_at_mass(50.0, 40.0, 0.3, w_mass);
    let b = recoil_at_mass(&(q + qbar), top_mass);
    let (p, pbar) = pair_at_mass(55.0, 45.0, -1.0, w_mass);
    let bbar = recoil_at_mass(&(p + pbar), top_mass);
    vec![b, bbar, q, qbar, p, pbar]
}

pub fn assert_momentum_close(actual: &FourMomentum, expected: &FourMomentum, epsilon: f64) {
    assert_relative_eq!(actual.px(), expected.px(), epsilon = epsilon);
    assert_relative_eq!(actual.py(), expected.py(), epsilon = epsilon);
    assert_relative_eq!(actual.pz(), expected.pz(), epsilon = epsilon);
    assert_relative_eq!(actual.e(), expected.e(), epsilon = epsilon);
}
