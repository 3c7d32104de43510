use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kinfit::constants::{TOP_MASS, W_MASS};
use kinfit::constraints::Constraint;
use kinfit::fit_particle::Parametrization;
use kinfit::four_momentum::FourMomentum;
use kinfit::hypotheses::{DecayChannel, Measurement, TopFitConfig, TopKinFitter};
use kinfit::kin_fitter::{FitParams, KinFitter};
use nalgebra::{DMatrix, DVector};

/// Massless jet at `η = 0` recoiling against `system` so that the total mass is `mass`.
fn recoil(system: &FourMomentum, mass: f64) -> FourMomentum {
    let phi = system.phi() + std::f64::consts::PI;
    let denom = 2.0 * (system.e() - system.px() * phi.cos() - system.py() * phi.sin());
    FourMomentum::from_pt_eta_phi_m((mass * mass - system.m2()) / denom, 0.0, phi, 0.0)
}

fn pair(pt1: f64, pt2: f64, phi1: f64, mass: f64) -> (FourMomentum, FourMomentum) {
    let dphi = (1.0 - mass * mass / (2.0 * pt1 * pt2)).acos();
    (
        FourMomentum::from_pt_eta_phi_m(pt1, 0.0, phi1, 0.0),
        FourMomentum::from_pt_eta_phi_m(pt2, 0.0, phi1 + dphi, 0.0),
    )
}

/// Uniform smearing of pT (±`rel`) and φ (±`dphi`).
#[inline]
fn smear(rng: &mut StdRng, p: &FourMomentum, rel: f64, dphi: f64) -> FourMomentum {
    FourMomentum::from_pt_eta_phi_m(
        p.pt() * (1.0 + rng.random_range(-rel..=rel)),
        p.eta(),
        p.phi() + rng.random_range(-dphi..=dphi),
        p.m().max(0.0),
    )
}

fn jet_cov() -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_vec(vec![25.0, 0.0025, 0.0025]))
}

/// Two-jet W-mass fit, the smallest meaningful problem.
fn bench_w_mass_fit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xDEADBEEF);
    let samples = 1_000usize;

    let mut fitter = KinFitter::new(FitParams::default());
    let q = fitter.add_particle("q", Parametrization::EtEtaPhi);
    let qbar = fitter.add_particle("qbar", Parametrization::EtEtaPhi);
    fitter
        .add_constraint(Constraint::invariant_mass("W mass", &[q, qbar], W_MASS))
        .unwrap();
    let cov = jet_cov();

    c.bench_function("kin_fit/w_mass_etetaphi", |b| {
        b.iter_batched(
            || {
                (0..samples)
                    .map(|_| {
                        let (p1, p2) = pair(50.0, 40.0, rng.random_range(-3.0..3.0), W_MASS);
                        (smear(&mut rng, &p1, 0.1, 0.05), smear(&mut rng, &p2, 0.1, 0.05))
                    })
                    .collect::<Vec<_>>()
            },
            |cases| {
                for (p1, p2) in cases {
                    fitter.initialize(q, &p1, &cov).unwrap();
                    fitter.initialize(qbar, &p2, &cov).unwrap();
                    black_box(fitter.fit().unwrap());
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// Full semi-leptonic hypothesis with the default parametrizations and four constraints.
fn bench_semileptonic(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let samples = 200usize;

    let channel = DecayChannel::SemiLeptonic;
    let config = TopFitConfig::for_channel(channel);
    let mut fitter = TopKinFitter::new(channel, &config).unwrap();

    c.bench_function("kin_fit/semileptonic_default", |b| {
        b.iter_batched(
            || {
                (0..samples)
                    .map(|_| {
                        let (p, q) = pair(50.0, 40.0, rng.random_range(-3.0..3.0), W_MASS);
                        let hb = recoil(&(p + q), TOP_MASS);
                        let (l, n) = pair(50.0, 45.0, rng.random_range(-3.0..3.0), W_MASS);
                        let lb = recoil(&(l + n), TOP_MASS);

                        [hb, p, q, lb, l, n]
                            .iter()
                            .zip(channel.roles())
                            .map(|(p4, role)| {
                                let p4 = smear(&mut rng, p4, 0.05, 0.02);
                                let param = config.parametrization_of(role.object_class());
                                let sigma = match param {
                                    Parametrization::EMomDev => vec![0.1 / p4.p(), 0.05, 0.05, 0.1],
                                    _ => vec![0.1, 0.05, 0.05],
                                };
                                Measurement::with_resolutions(p4, &sigma)
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            },
            |cases| {
                for candidate in cases {
                    black_box(fitter.fit_candidate(&candidate));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_w_mass_fit, bench_semileptonic);
criterion_main!(benches);
