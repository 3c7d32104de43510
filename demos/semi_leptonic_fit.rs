use kinfit::constants::{TOP_MASS, W_MASS};
use kinfit::four_momentum::FourMomentum;
use kinfit::hypotheses::{DecayChannel, Measurement, Role, TopFitConfig, TopKinFitter};
use kinfit::fit_particle::Parametrization;
use kinfit::kinfit_errors::KinFitError;
use kinfit::ranking::CandidateRanking;

/// Build the measurements of one jet-to-parton assignment.
///
/// Arguments
/// -----------------
/// * `config`: the fit configuration, which fixes the parametrization of every object.
/// * `jets`: the four jets, in `HadB, HadP, HadQ, LepB` order.
/// * `lepton`, `neutrino`: the charged lepton and the missing transverse momentum.
///
/// Return
/// ----------
/// * One [`Measurement`] per role of the semi-leptonic hypothesis.
fn candidate(
    config: &TopFitConfig,
    jets: [FourMomentum; 4],
    lepton: FourMomentum,
    neutrino: FourMomentum,
) -> Vec<Measurement> {
    let objects = [jets[0], jets[1], jets[2], jets[3], lepton, neutrino];
    DecayChannel::SemiLeptonic
        .roles()
        .iter()
        .zip(objects)
        .map(|(role, p4)| {
            let sigma = match config.parametrization_of(role.object_class()) {
                Parametrization::EMomDev => vec![0.1 / p4.p(), 0.05, 0.05, 0.1],
                Parametrization::EScaledMomDev => vec![0.05, 0.02, 0.02],
                _ => vec![0.1 * p4.et(), 0.05, 0.05],
            };
            Measurement::with_resolutions(p4, &sigma)
        })
        .collect()
}

fn main() -> Result<(), KinFitError> {
    let config = TopFitConfig::for_channel(DecayChannel::SemiLeptonic);
    println!("{config}");
    println!("{:#}", config.fit);

    let mut fitter = TopKinFitter::new(DecayChannel::SemiLeptonic, &config)?;

    let jets = [
        FourMomentum::from_pt_eta_phi_m(92.0, 0.1, -2.6, 4.8),
        FourMomentum::from_pt_eta_phi_m(48.0, 0.2, 0.3, 0.0),
        FourMomentum::from_pt_eta_phi_m(41.0, -0.1, 2.5, 0.0),
        FourMomentum::from_pt_eta_phi_m(78.0, -0.4, -1.1, 4.8),
    ];
    let lepton = FourMomentum::from_pt_eta_phi_m(51.0, 0.6, 2.0, 0.0);
    let neutrino = FourMomentum::from_pt_eta_phi_m(47.0, 0.0, -3.0, 0.0);

    // the hadronic-W jets are interchangeable, so only their unordered pair matters
    let mut ranking = CandidateRanking::new();
    for hb in 0..4 {
        for lb in (0..4).filter(|&i| i != hb) {
            let light = (0..4).filter(|&i| i != hb && i != lb).collect::<Vec<_>>();
            let combi = [hb, light[0], light[1], lb];
            let measured = candidate(&config, combi.map(|i| jets[i]), lepton, neutrino);
            ranking.push(combi, fitter.fit_candidate(&measured));
        }
    }

    println!(
        "{} combination(s) fitted, {} converged, {} aborted",
        ranking.len(),
        ranking.n_converged(),
        ranking.n_aborted()
    );

    for ranked in ranking.into_ranked(Some(3)) {
        println!("#{} jets {:?}: {:#}", ranked.rank, ranked.combination, ranked.result);
        if ranked.result.status.is_usable() {
            let m_w = [Role::HadP, Role::HadQ]
                .iter()
                .filter_map(|r| fitter.fitted(&ranked.result, *r))
                .map(|p| p.momentum)
                .sum::<FourMomentum>()
                .m();
            println!("   m(W_had) = {m_w:.2} GeV (target {W_MASS}), m(top) target {TOP_MASS}");
        }
    }
    Ok(())
}
